//! Apply record storage and persistence.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::distribute::node::{ApplyState, NodeApplyRecord, NodeIdentity};
use crate::merge::ConfigHash;

/// Thread-safe store of per-node apply records.
///
/// Records can be persisted to a JSON state file so a restarted daemon does
/// not push to nodes that are already current. Without a state file every
/// node starts as `Unknown` and receives one push after a restart.
#[derive(Debug, Clone, Default)]
pub struct ApplyRecordStore {
    inner: Arc<DashMap<String, NodeApplyRecord>>,
    persistence_path: Option<PathBuf>,
}

impl ApplyRecordStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Load from the state file if it exists.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let records: BTreeMap<String, NodeApplyRecord> = serde_json::from_reader(reader)?;
            for (name, record) in records {
                store.inner.insert(name, record);
            }
            tracing::info!(path = %path.display(), records = store.inner.len(), "Loaded node apply records");
        }
        Ok(store)
    }

    /// Write the records to the state file, if one is configured.
    ///
    /// Writes a sibling temp file and renames it over the target.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let tmp = path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, &self.snapshot_map())?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), records = self.inner.len(), "Saved node apply records");
        Ok(())
    }

    pub fn get(&self, node: &str) -> Option<NodeApplyRecord> {
        self.inner.get(node).map(|r| r.value().clone())
    }

    /// True when the node is `Applied` at `hash`.
    pub fn is_current(&self, node: &str, hash: &ConfigHash) -> bool {
        self.inner.get(node).is_some_and(|r| r.is_current(hash))
    }

    /// True when every listed node is `Applied` at `hash`.
    pub fn all_current(&self, nodes: &[NodeIdentity], hash: &ConfigHash) -> bool {
        nodes.iter().all(|n| self.is_current(&n.name, hash))
    }

    /// Drop records of nodes that are no longer fleet members.
    pub fn prune(&self, fleet: &[NodeIdentity]) -> usize {
        let members: HashSet<&str> = fleet.iter().map(|n| n.name.as_str()).collect();
        let before = self.inner.len();
        self.inner.retain(|name, _| members.contains(name.as_str()));
        let removed = before - self.inner.len();
        if removed > 0 {
            tracing::info!(removed, "Pruned apply records of departed nodes");
        }
        removed
    }

    pub fn mark_pending(&self, node: &NodeIdentity) {
        self.update(node, NodeApplyRecord::mark_pending);
    }

    pub fn mark_applied(&self, node: &NodeIdentity, hash: &ConfigHash, at: DateTime<Utc>) {
        self.update(node, |r| r.mark_applied(hash.clone(), at));
    }

    pub fn mark_failed(&self, node: &NodeIdentity, error: &str, at: DateTime<Utc>) {
        self.update(node, |r| r.mark_failed(error.to_string(), at));
    }

    pub fn mark_not_attempted(&self, node: &NodeIdentity) {
        self.update(node, NodeApplyRecord::mark_not_attempted);
    }

    fn update(&self, node: &NodeIdentity, f: impl FnOnce(&mut NodeApplyRecord)) {
        let mut record = self
            .inner
            .entry(node.name.clone())
            .or_insert_with(|| NodeApplyRecord::new(node.clone()));
        record.node = node.clone();
        f(record.value_mut());
    }

    /// All records sorted by node name.
    pub fn snapshot(&self) -> Vec<NodeApplyRecord> {
        self.snapshot_map().into_values().collect()
    }

    fn snapshot_map(&self) -> BTreeMap<String, NodeApplyRecord> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Number of records in the given state.
    pub fn count_in(&self, state: ApplyState) -> usize {
        self.inner.iter().filter(|r| r.value().state == state).count()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
