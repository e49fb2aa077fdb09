//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciler and distributor produce:
//!     → logging.rs (structured log events, one span per pass)
//!     → metrics.rs (counters, gauges)
//!     → events.rs  (conflicts, node failures, pass summaries)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Pass ID (UUID v4) flows through every log line of a pass via the span
//! - Metrics are cheap (atomic increments)
//! - Events go through a trait so tests and other hosts can capture them

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventRecorder, LogEventRecorder};
