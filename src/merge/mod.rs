//! Mirror configuration builder.
//!
//! # Data Flow
//! ```text
//! MirrorRuleSet (digest + tag rules)
//!     → normalize.rs (scheme/slash/case normalization)
//!     → builder.rs   (group by source, order by precedence, dedup, detect conflicts)
//!     → canonical.rs (CanonicalRegistryConfig + content hash)
//! ```
//!
//! # Design Decisions
//! - Pure: no I/O, no clock, no randomness
//! - Output depends only on rule content, never on read order
//! - Conflicts are reported, not fatal; losing endpoints are appended, not dropped
//! - The content hash is the only value compared across passes

pub mod builder;
pub mod canonical;
pub mod normalize;

pub use builder::{merge, ConflictWarning, MergeOutput};
pub use canonical::{CanonicalRegistryConfig, ConfigHash, MirrorEndpoint, RegistryEntry};
