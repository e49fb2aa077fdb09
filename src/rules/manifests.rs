//! Directory-backed cluster store.
//!
//! Reads `*.yaml`, `*.yml` and `*.json` manifests (multi-document YAML
//! allowed) and dispatches each document on its `kind`. Documents of other
//! kinds are ignored. Any unreadable or undecodable file fails the whole
//! listing so a half-written manifest never produces a partial rule set.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::cluster::StoreError;
use crate::rules::resources::{ImageDigestMirrorSet, ImageTagMirrorSet, DIGEST_MIRROR_SET_KIND, TAG_MIRROR_SET_KIND};
use crate::rules::source::{ClusterStore, MirrorSets, SourceError};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Cluster store backed by a directory of manifests.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every manifest in the directory, in file-name order.
    pub async fn load(&self) -> Result<MirrorSets, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_manifest = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
            if is_manifest && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut manifests = MirrorSets::default();
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await.map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            parse_documents(&path, &content, &mut manifests)?;
        }
        Ok(manifests)
    }
}

fn parse_documents(path: &Path, content: &str, out: &mut MirrorSets) -> Result<(), StoreError> {
    let parse_err = |e: serde_yaml::Error| StoreError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document).map_err(parse_err)?;
        if value.is_null() {
            continue;
        }

        match value.get("kind").and_then(|k| k.as_str()) {
            Some(DIGEST_MIRROR_SET_KIND) => out.digest.push(serde_yaml::from_value(value).map_err(parse_err)?),
            Some(TAG_MIRROR_SET_KIND) => out.tag.push(serde_yaml::from_value(value).map_err(parse_err)?),
            other => {
                tracing::trace!(path = %path.display(), kind = ?other, "Ignoring manifest document");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl ClusterStore for ManifestStore {
    async fn list_digest_mirror_sets(&self) -> Result<Vec<ImageDigestMirrorSet>, StoreError> {
        Ok(self.load().await?.digest)
    }

    async fn list_tag_mirror_sets(&self) -> Result<Vec<ImageTagMirrorSet>, StoreError> {
        Ok(self.load().await?.tag)
    }

    async fn list_all(&self) -> Result<MirrorSets, SourceError> {
        self.load().await.map_err(SourceError::Snapshot)
    }
}
