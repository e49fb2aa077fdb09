//! Shared fakes for reconcile integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use mirror_reconciler::cluster::{StaticFleet, StaticNetwork, StoreError};
use mirror_reconciler::config::DistributionConfig;
use mirror_reconciler::distribute::{
    ApplyRecordStore, Distributor, NodeFailure, NodeIdentity, NodeTransport, TransportError,
};
use mirror_reconciler::merge::{ConfigHash, ConflictWarning};
use mirror_reconciler::observability::EventRecorder;
use mirror_reconciler::reconcile::{PassReport, Reconciler};
use mirror_reconciler::render::NodeArtifact;
use mirror_reconciler::rules::{
    ClusterStore, ImageDigestMirrorSet, ImageMirrors, ImageTagMirrorSet, MirrorRuleSource, ObjectMeta,
};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

pub fn idms(name: &str, created: i64, mirrors: Vec<ImageMirrors>) -> ImageDigestMirrorSet {
    ImageDigestMirrorSet::new(ObjectMeta::new(name, at(created)), mirrors)
}

pub fn itms(name: &str, created: i64, mirrors: Vec<ImageMirrors>) -> ImageTagMirrorSet {
    ImageTagMirrorSet::new(ObjectMeta::new(name, at(created)), mirrors)
}

pub fn mirrors(source: &str, endpoints: &[&str]) -> ImageMirrors {
    ImageMirrors::new(source, endpoints.iter().copied())
}

pub fn nodes(names: &[&str]) -> Vec<NodeIdentity> {
    names.iter().map(|n| NodeIdentity::new(*n, format!("{n}.local"))).collect()
}

/// In-memory mirror-set collections that can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    digest: Mutex<Vec<ImageDigestMirrorSet>>,
    tag: Mutex<Vec<ImageTagMirrorSet>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn set_digest(&self, sets: Vec<ImageDigestMirrorSet>) {
        *self.digest.lock().unwrap() = sets;
    }

    pub fn set_tag(&self, sets: Vec<ImageTagMirrorSet>) {
        *self.tag.lock().unwrap() = sets;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("api server unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn list_digest_mirror_sets(&self) -> Result<Vec<ImageDigestMirrorSet>, StoreError> {
        self.check()?;
        Ok(self.digest.lock().unwrap().clone())
    }

    async fn list_tag_mirror_sets(&self) -> Result<Vec<ImageTagMirrorSet>, StoreError> {
        self.check()?;
        Ok(self.tag.lock().unwrap().clone())
    }
}

/// Transport that records every push and fails chosen nodes.
#[derive(Default)]
pub struct ScriptedTransport {
    pushes: AtomicUsize,
    delivered: Mutex<BTreeMap<String, NodeArtifact>>,
    failing: Mutex<HashSet<String>>,
}

impl ScriptedTransport {
    pub fn fail(&self, node: &str) {
        self.failing.lock().unwrap().insert(node.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn delivered(&self, node: &str) -> Option<NodeArtifact> {
        self.delivered.lock().unwrap().get(node).cloned()
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn push(&self, node: &NodeIdentity, artifact: &NodeArtifact) -> Result<(), TransportError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&node.name) {
            return Err(TransportError::Unreachable {
                node: node.name.clone(),
                reason: "node agent not responding".into(),
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .insert(node.name.clone(), artifact.clone());
        Ok(())
    }
}

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingEvents {
    pub conflicts: Mutex<Vec<ConflictWarning>>,
    pub failures: Mutex<Vec<(NodeFailure, ConfigHash)>>,
    pub reports: Mutex<Vec<PassReport>>,
}

impl EventRecorder for RecordingEvents {
    fn conflict_detected(&self, conflict: &ConflictWarning) {
        self.conflicts.lock().unwrap().push(conflict.clone());
    }

    fn distribution_failed(&self, failure: &NodeFailure, hash: &ConfigHash) {
        self.failures.lock().unwrap().push((failure.clone(), hash.clone()));
    }

    fn pass_completed(&self, report: &PassReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// A reconciler wired to in-memory fakes.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub events: Arc<RecordingEvents>,
    pub fleet: Arc<StaticFleet>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(fleet: &[&str]) -> Self {
        Self::with_records(fleet, ApplyRecordStore::new(None))
    }

    pub fn with_records(fleet: &[&str], records: ApplyRecordStore) -> Self {
        let store = Arc::new(MemoryStore::default());
        let transport = Arc::new(ScriptedTransport::default());
        let events = Arc::new(RecordingEvents::default());
        let fleet = Arc::new(StaticFleet::new(nodes(fleet)));

        let distributor = Distributor::new(transport.clone(), records, &DistributionConfig::default());
        let reconciler = Reconciler::new(
            MirrorRuleSource::new(store.clone()),
            fleet.clone(),
            Arc::new(StaticNetwork::new(Some("172.30.0.0/16".into()))),
            distributor,
            events.clone(),
        );

        Self {
            store,
            transport,
            events,
            fleet,
            reconciler,
        }
    }
}
