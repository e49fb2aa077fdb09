//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Reconcile pass ends with requeue or a transient error:
//!     → backoff.rs (next delay, exponential with jitter, capped)
//!     → controller sleeps, then runs the next pass
//! Clean pass:
//!     → backoff reset, next pass at the resync interval
//! ```
//!
//! # Design Decisions
//! - Per-push deadlines live in the distributor; only pass scheduling backs off
//! - Jitter keeps several daemons from retrying in lockstep

pub mod backoff;

pub use backoff::{calculate_backoff, RequeueBackoff};
