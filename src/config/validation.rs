//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check fleet integrity (node names present and unique)
//! - Validate value ranges (concurrency > 0, timeouts > 0, backoff bounds)
//! - Keep `distribution.config_dir` relative to each node's root
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Component, Path};

use crate::config::schema::DaemonConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (i, node) in config.fleet.nodes.iter().enumerate() {
        if node.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("fleet.nodes[{i}].name"), "must not be empty"));
        } else if !seen.insert(node.name.as_str()) {
            errors.push(ValidationError::new(
                format!("fleet.nodes[{i}].name"),
                format!("duplicate node name '{}'", node.name),
            ));
        }
    }

    let dist = &config.distribution;
    if dist.max_concurrency == 0 {
        errors.push(ValidationError::new("distribution.max_concurrency", "must be greater than 0"));
    }
    if dist.push_timeout_secs == 0 {
        errors.push(ValidationError::new("distribution.push_timeout_secs", "must be greater than 0"));
    }
    if dist.config_dir.trim().is_empty() {
        errors.push(ValidationError::new("distribution.config_dir", "must not be empty"));
    } else if !is_node_relative(&dist.config_dir) {
        errors.push(ValidationError::new(
            "distribution.config_dir",
            "must be a relative path without '..' components",
        ));
    }

    let ctl = &config.controller;
    if ctl.resync_secs == 0 {
        errors.push(ValidationError::new("controller.resync_secs", "must be greater than 0"));
    }
    if ctl.backoff_base_ms > ctl.backoff_max_ms {
        errors.push(ValidationError::new(
            "controller.backoff_base_ms",
            format!("must not exceed backoff_max_ms ({})", ctl.backoff_max_ms),
        ));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Relative path that stays below the directory it is joined onto.
///
/// Drive prefixes and backslash roots are rejected on every platform since
/// the rendered files end up on Windows nodes.
fn is_node_relative(dir: &str) -> bool {
    if dir.starts_with('\\') || dir.contains(':') {
        return false;
    }
    Path::new(dir)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
