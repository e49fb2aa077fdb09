//! Controller host loop.
//!
//! # Data Flow
//! ```text
//! startup ───────────────┐
//! resync timer ──────────┤
//! WatchEvent::SourcesChanged ─┤──▶ Reconcile::reconcile_once ──▶ requeue? ──▶ backoff delay
//! WatchEvent::ConfigReloaded ─┘        (fleet swapped first)       clean   ──▶ resync delay
//!
//! shutdown token ──▶ cancels the pass in flight, loop exits
//! ```
//!
//! # Design Decisions
//! - Bursts of watch events collapse into one pass
//! - A change event runs a pass immediately, even during backoff
//! - Fatal pass errors wait for the next resync or change instead of spinning

pub mod runner;

pub use runner::Controller;
