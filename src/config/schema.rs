//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::distribute::NodeIdentity;

/// Root configuration for the mirror reconciler daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Where mirror rule manifests are read from.
    pub sources: SourcesConfig,

    /// Windows nodes that receive the registry configuration.
    pub fleet: FleetConfig,

    /// Cluster network information.
    pub cluster: ClusterConfig,

    /// Fan-out and on-node layout settings.
    pub distribution: DistributionConfig,

    /// Resync and requeue timing.
    pub controller: ControllerConfig,

    /// Persistence of per-node apply records.
    pub state: StateConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Mirror rule source settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// Directory of ImageDigestMirrorSet / ImageTagMirrorSet manifests.
    pub manifests_dir: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            manifests_dir: PathBuf::from("manifests"),
        }
    }
}

/// Fleet membership. Reloaded on config change without a restart.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub nodes: Vec<NodeIdentity>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Service network CIDR (e.g., "172.30.0.0/16"). Reported with each pass.
    pub service_cidr: Option<String>,
}

/// Distribution configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DistributionConfig {
    /// Maximum number of node pushes in flight.
    pub max_concurrency: usize,

    /// Deadline for a single node push in seconds.
    pub push_timeout_secs: u64,

    /// Root directory the directory transport writes node artifacts under.
    pub output_root: PathBuf,

    /// Registry config directory on the node, relative to the artifact root.
    pub config_dir: String,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            push_timeout_secs: 30,
            output_root: PathBuf::from("nodes"),
            config_dir: "certs.d".to_string(),
        }
    }
}

/// Controller loop timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Periodic resync interval in seconds.
    pub resync_secs: u64,

    /// Base delay for requeue backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum requeue delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_secs: 300,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file holding apply records across restarts. In-memory when unset.
    pub records_path: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
