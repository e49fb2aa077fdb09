//! One reconcile pass: read, merge, verify, distribute.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::cluster::{ClusterNetwork, Fleet};
use crate::distribute::{DistributionResult, Distributor};
use crate::merge::{merge, CanonicalRegistryConfig, ConfigHash, MergeOutput};
use crate::observability::events::EventRecorder;
use crate::observability::metrics;
use crate::reconcile::error::ReconcileError;
use crate::rules::MirrorRuleSource;
use crate::CONTROLLER_NAME;

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub hash: ConfigHash,
    pub generation: u64,
    /// Number of source references in the merged configuration.
    pub registries: usize,
    pub conflicts: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub not_attempted: Vec<String>,
    pub service_cidr: Option<String>,
}

/// What the host should do after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Schedule another pass after a backoff.
    pub requeue: bool,
    pub report: PassReport,
}

/// A single-pass reconcile capability a host can drive.
#[async_trait]
pub trait Reconcile: Send {
    async fn reconcile_once(&mut self, cancel: &CancellationToken) -> Result<PassOutcome, ReconcileError>;
}

/// Drives the fleet toward the configuration implied by the current rules.
pub struct Reconciler {
    source: MirrorRuleSource,
    fleet: Arc<dyn Fleet>,
    network: Arc<dyn ClusterNetwork>,
    distributor: Distributor,
    events: Arc<dyn EventRecorder>,
    /// Hash every fleet node was confirmed to run at the end of a pass.
    last_known_good: Option<ConfigHash>,
    /// Latest merged hash and the generation assigned to it.
    current: Option<(ConfigHash, u64)>,
}

impl Reconciler {
    pub fn new(
        source: MirrorRuleSource,
        fleet: Arc<dyn Fleet>,
        network: Arc<dyn ClusterNetwork>,
        distributor: Distributor,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            source,
            fleet,
            network,
            distributor,
            events,
            last_known_good: None,
            current: None,
        }
    }

    pub fn last_known_good(&self) -> Option<&ConfigHash> {
        self.last_known_good.as_ref()
    }

    /// Generation of the most recently merged configuration, 0 before the first pass.
    pub fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |(_, generation)| *generation)
    }

    pub fn distributor(&self) -> &Distributor {
        &self.distributor
    }

    async fn run_pass(&mut self, pass_id: Uuid, cancel: &CancellationToken) -> Result<PassOutcome, ReconcileError> {
        let rules = self.source.fetch_all().await?;
        let nodes = self.fleet.nodes().await.map_err(ReconcileError::FleetUnavailable)?;

        let MergeOutput { config, conflicts } = merge(&rules);
        for conflict in &conflicts {
            self.events.conflict_detected(conflict);
        }
        metrics::record_conflicts(conflicts.len());

        verify(&config, &merge(&rules).config)?;

        let service_cidr = self.network.service_cidr();
        let pruned = self.distributor.records().prune(&nodes);

        if self.last_known_good.as_ref() == Some(&config.hash)
            && self.distributor.records().all_current(&nodes, &config.hash)
        {
            tracing::debug!(hash = %config.hash.short(), nodes = nodes.len(), "Fleet already converged");
            if pruned > 0 {
                self.distributor.records().save_to_file().map_err(ReconcileError::Persist)?;
            }
            let report = PassReport {
                pass_id,
                hash: config.hash.clone(),
                generation: self.generation(),
                registries: config.len(),
                conflicts: conflicts.len(),
                applied: 0,
                skipped: nodes.len(),
                failed: Vec::new(),
                not_attempted: Vec::new(),
                service_cidr,
            };
            self.events.pass_completed(&report);
            return Ok(PassOutcome { requeue: false, report });
        }

        let generation = self.assign_generation(&config.hash);
        let config = config.with_generation(generation);
        metrics::record_generation(generation);

        let result = self.distributor.apply(&config, &nodes, cancel).await;
        for failure in &result.failed {
            self.events.distribution_failed(failure, &config.hash);
        }

        let report = report_from(pass_id, &config, conflicts.len(), &result, service_cidr);
        self.events.pass_completed(&report);

        self.distributor.records().save_to_file().map_err(ReconcileError::Persist)?;

        if result.is_complete() {
            if self.last_known_good.as_ref() != Some(&config.hash) {
                tracing::info!(
                    hash = %config.hash.short(),
                    generation,
                    nodes = nodes.len(),
                    "Fleet converged on new registry configuration"
                );
            }
            self.last_known_good = Some(config.hash.clone());
        }

        Ok(PassOutcome {
            requeue: result.needs_requeue(),
            report,
        })
    }

    fn assign_generation(&mut self, hash: &ConfigHash) -> u64 {
        let generation = match &self.current {
            Some((current, generation)) if current == hash => return *generation,
            Some((_, generation)) => generation + 1,
            None => 1,
        };
        self.current = Some((hash.clone(), generation));
        generation
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    async fn reconcile_once(&mut self, cancel: &CancellationToken) -> Result<PassOutcome, ReconcileError> {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("reconcile", controller = CONTROLLER_NAME, %pass_id);

        let result = self.run_pass(pass_id, cancel).instrument(span).await;
        match &result {
            Ok(outcome) if outcome.requeue => metrics::record_pass("requeued"),
            Ok(_) => metrics::record_pass("converged"),
            Err(e) => metrics::record_pass(e.outcome()),
        }
        result
    }
}

/// Check the stored hash against the content, and that merging the same rules
/// again yields the same hash.
fn verify(config: &CanonicalRegistryConfig, again: &CanonicalRegistryConfig) -> Result<(), ReconcileError> {
    if !config.verify_hash() {
        return Err(ReconcileError::InvariantViolation(format!(
            "hash {} does not match merged content",
            config.hash
        )));
    }
    if again.hash != config.hash {
        return Err(ReconcileError::InvariantViolation(format!(
            "merge is not deterministic: {} then {}",
            config.hash, again.hash
        )));
    }
    Ok(())
}

fn report_from(
    pass_id: Uuid,
    config: &CanonicalRegistryConfig,
    conflicts: usize,
    result: &DistributionResult,
    service_cidr: Option<String>,
) -> PassReport {
    PassReport {
        pass_id,
        hash: config.hash.clone(),
        generation: config.generation,
        registries: config.len(),
        conflicts,
        applied: result.applied.len(),
        skipped: result.skipped.len(),
        failed: result.failed.iter().map(|f| f.node.clone()).collect(),
        not_attempted: result.not_attempted.clone(),
        service_cidr,
    }
}
