//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Restore records → Build collaborators → Reconciler
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel token → In-flight pushes stop → Controller exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then state, then the controller loop
//! - Nodes cut off by shutdown are recorded as not attempted and retried next start

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
