//! Registry mirror reconciler library.
//!
//! Merges ImageDigestMirrorSet and ImageTagMirrorSet resources into one
//! canonical registry configuration and delivers it to a fleet of nodes.

pub mod cluster;
pub mod config;
pub mod controller;
pub mod distribute;
pub mod lifecycle;
pub mod merge;
pub mod observability;
pub mod reconcile;
pub mod render;
pub mod resilience;
pub mod rules;

pub use config::schema::DaemonConfig;
pub use controller::Controller;
pub use lifecycle::Shutdown;
pub use reconcile::{Reconcile, Reconciler};

/// Name of the controller in logs, spans and events.
pub const CONTROLLER_NAME: &str = "registry";
