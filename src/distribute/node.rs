//! Node identity and per-node apply records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::ConfigHash;

/// A fleet member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Unique node name.
    pub name: String,
    /// Address the transport uses to reach the node.
    #[serde(default)]
    pub address: String,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Apply state of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    #[default]
    Unknown,
    Pending,
    Applied,
    Failed,
    /// A pass was cancelled before this node's push completed.
    NotAttempted,
}

impl ApplyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyState::Unknown => "unknown",
            ApplyState::Pending => "pending",
            ApplyState::Applied => "applied",
            ApplyState::Failed => "failed",
            ApplyState::NotAttempted => "not_attempted",
        }
    }
}

/// What the distributor knows about one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeApplyRecord {
    pub node: NodeIdentity,
    /// Hash of the last configuration successfully applied.
    pub last_hash: Option<ConfigHash>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub state: ApplyState,
    pub last_error: Option<String>,
}

impl NodeApplyRecord {
    pub fn new(node: NodeIdentity) -> Self {
        Self {
            node,
            last_hash: None,
            last_attempt: None,
            state: ApplyState::Unknown,
            last_error: None,
        }
    }

    /// True when the node already runs the configuration with `hash`.
    pub fn is_current(&self, hash: &ConfigHash) -> bool {
        self.state == ApplyState::Applied && self.last_hash.as_ref() == Some(hash)
    }

    pub fn mark_pending(&mut self) {
        self.state = ApplyState::Pending;
    }

    pub fn mark_applied(&mut self, hash: ConfigHash, at: DateTime<Utc>) {
        self.state = ApplyState::Applied;
        self.last_hash = Some(hash);
        self.last_attempt = Some(at);
        self.last_error = None;
    }

    /// `last_hash` is kept: the node still runs whatever it ran before.
    pub fn mark_failed(&mut self, error: String, at: DateTime<Utc>) {
        self.state = ApplyState::Failed;
        self.last_attempt = Some(at);
        self.last_error = Some(error);
    }

    pub fn mark_not_attempted(&mut self) {
        self.state = ApplyState::NotAttempted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_then_applied() {
        let hash = ConfigHash::from("abc");
        let mut record = NodeApplyRecord::new(NodeIdentity::new("win-a", "10.0.0.1"));
        assert_eq!(record.state, ApplyState::Unknown);
        assert!(!record.is_current(&hash));

        record.mark_pending();
        record.mark_failed("connection refused".into(), Utc::now());
        assert_eq!(record.state, ApplyState::Failed);
        assert!(!record.is_current(&hash));

        record.mark_pending();
        record.mark_applied(hash.clone(), Utc::now());
        assert!(record.is_current(&hash));
        assert!(record.last_error.is_none());
        assert!(!record.is_current(&ConfigHash::from("def")));
    }

    #[test]
    fn test_failure_keeps_previous_hash() {
        let mut record = NodeApplyRecord::new(NodeIdentity::new("win-a", ""));
        record.mark_applied(ConfigHash::from("old"), Utc::now());
        record.mark_failed("timeout".into(), Utc::now());
        assert_eq!(record.last_hash, Some(ConfigHash::from("old")));
        assert!(!record.is_current(&ConfigHash::from("old")));
    }
}
