//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → sections handed to the subsystems that own them
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → WatchEvent::ConfigReloaded to the controller
//!     → fleet swapped atomically, next pass uses it
//!
//!     manifest directory change → WatchEvent::SourcesChanged → immediate pass
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only fleet membership is applied live; other sections need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClusterConfig, ControllerConfig, DaemonConfig, DistributionConfig, FleetConfig, ObservabilityConfig,
    SourcesConfig, StateConfig,
};
pub use watcher::{SourceWatcher, WatchEvent};
