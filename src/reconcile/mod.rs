//! Reconcile driver.
//!
//! # Data Flow
//! ```text
//! reconcile_once(cancel)
//!     → MirrorRuleSource::fetch_all      (error → SourceUnavailable, nothing mutated)
//!     → Fleet::nodes                     (error → FleetUnavailable)
//!     → merge                            (conflicts → EventRecorder)
//!     → verify hash + determinism        (mismatch → InvariantViolation)
//!     → steady state?                    (hash == last known good, all nodes current → done)
//!     → assign generation
//!     → Distributor::apply               (any failed / not attempted node → requeue)
//!     → save records, update last known good
//!     → PassReport → EventRecorder
//! ```
//!
//! # Design Decisions
//! - One pass at a time: `reconcile_once` takes `&mut self`
//! - The driver never sleeps or retries; requeue timing belongs to the host
//! - Last known good only advances when every fleet node confirmed the hash

pub mod driver;
pub mod error;

pub use driver::{PassOutcome, PassReport, Reconcile, Reconciler};
pub use error::ReconcileError;
