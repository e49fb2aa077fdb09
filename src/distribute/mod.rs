//! Node configuration distribution.
//!
//! # Data Flow
//! ```text
//! CanonicalRegistryConfig + fleet
//!     → render (one NodeArtifact for every node)
//!     → records.rs (skip nodes already at the target hash)
//!     → distributor.rs (bounded concurrent pushes via transport.rs)
//!     → records.rs (Applied / Failed / NotAttempted per node)
//!     → DistributionResult back to the reconciler
//! ```
//!
//! # State Machine (per node)
//! ```text
//! Unknown → Pending → Applied
//!                   → Failed → Pending → Applied
//!                   → NotAttempted (cancelled) → Pending → ...
//! ```
//! There is no terminal failure state: every node not `Applied` at the
//! current hash is reconsidered on every pass.
//!
//! # Design Decisions
//! - A failed push never blocks or rolls back another node
//! - No retries inside one `apply`; the reconciler requeues the whole pass
//! - Records of nodes that left the fleet are pruned

pub mod distributor;
pub mod node;
pub mod records;
pub mod transport;

pub use distributor::{DistributionResult, Distributor, NodeFailure};
pub use node::{ApplyState, NodeApplyRecord, NodeIdentity};
pub use records::ApplyRecordStore;
pub use transport::{DirectoryTransport, NodeTransport, TransportError};
