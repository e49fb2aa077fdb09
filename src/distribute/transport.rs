//! Delivery of rendered artifacts to nodes.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::distribute::node::NodeIdentity;
use crate::render::NodeArtifact;

/// Directory under a node's root that holds the live configuration.
const LIVE_DIR: &str = "registry";
const STAGING_DIR: &str = ".registry.staging";
const PREVIOUS_DIR: &str = ".registry.previous";

/// Delivering a configuration to one node failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Node {node} unreachable: {reason}")]
    Unreachable { node: String, reason: String },

    #[error("I/O error on node {node}: {source}")]
    Io {
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Push to node {node} timed out after {timeout:?}")]
    Timeout { node: String, timeout: Duration },

    /// The artifact names a file outside the node's configuration root.
    #[error("Refusing to write {} for node {node}: not a relative path inside the node root", path.display())]
    InvalidPath { node: String, path: PathBuf },
}

/// Pushes a rendered configuration to a single node.
///
/// Implementations own connection setup and credentials. A push either
/// replaces the node's configuration completely or fails.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn push(&self, node: &NodeIdentity, artifact: &NodeArtifact) -> Result<(), TransportError>;
}

/// Transport that writes each node's configuration under `<root>/<node>/registry`.
///
/// Used for local runs and for hosts that sync a shared directory to nodes.
/// Files are written into a staging directory first and swapped in with
/// renames, so readers never see a half-written configuration.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Live configuration directory for a node.
    pub fn node_dir(&self, node: &NodeIdentity) -> PathBuf {
        self.root.join(&node.name).join(LIVE_DIR)
    }

    async fn write_artifact(&self, node: &NodeIdentity, artifact: &NodeArtifact) -> std::io::Result<()> {
        let node_root = self.root.join(&node.name);
        let staging = node_root.join(STAGING_DIR);
        let previous = node_root.join(PREVIOUS_DIR);
        let live = node_root.join(LIVE_DIR);

        remove_dir_if_exists(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;
        for (relative, content) in &artifact.files {
            let target = staging.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
        }
        tokio::fs::write(staging.join(".hash"), artifact.hash.as_str()).await?;

        remove_dir_if_exists(&previous).await?;
        if tokio::fs::try_exists(&live).await? {
            tokio::fs::rename(&live, &previous).await?;
        }
        tokio::fs::rename(&staging, &live).await?;
        remove_dir_if_exists(&previous).await
    }
}

/// Non-empty, relative, and made only of normal components (no `..`, no root).
fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl NodeTransport for DirectoryTransport {
    async fn push(&self, node: &NodeIdentity, artifact: &NodeArtifact) -> Result<(), TransportError> {
        if let Some(path) = artifact.files.keys().find(|p| !is_plain_relative(p)) {
            return Err(TransportError::InvalidPath {
                node: node.name.clone(),
                path: path.clone(),
            });
        }

        self.write_artifact(node, artifact)
            .await
            .map_err(|source| TransportError::Io {
                node: node.name.clone(),
                source,
            })?;
        tracing::debug!(
            node = %node.name,
            files = artifact.files.len(),
            hash = %artifact.hash.short(),
            "Wrote registry configuration"
        );
        Ok(())
    }
}
