//! Cluster-facing collaborators.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → fleet.rs   (which nodes must receive the configuration)
//!     → network.rs (service CIDR, informational)
//!
//! Both are read once per pass; neither feeds the merge.
//! ```
//!
//! # Design Decisions
//! - Collaborators are traits so any host (daemon, tests) can supply them
//! - Static implementations are hot-reloadable from the daemon config

pub mod error;
pub mod fleet;
pub mod network;

pub use error::StoreError;
pub use fleet::{Fleet, StaticFleet};
pub use network::{ClusterNetwork, StaticNetwork};
