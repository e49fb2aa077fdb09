//! Bounded concurrent fan-out of one configuration to the fleet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::DistributionConfig;
use crate::distribute::node::{ApplyState, NodeIdentity};
use crate::distribute::records::ApplyRecordStore;
use crate::distribute::transport::{NodeTransport, TransportError};
use crate::merge::CanonicalRegistryConfig;
use crate::observability::metrics;
use crate::render::{render, NodeArtifact};

/// A node whose push failed during this call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node: String,
    pub error: String,
}

/// Aggregate outcome of one `apply` call. Node names are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistributionResult {
    /// Pushed successfully.
    pub applied: Vec<String>,
    /// Already at the target hash; no push.
    pub skipped: Vec<String>,
    pub failed: Vec<NodeFailure>,
    /// Not completed because the pass was cancelled.
    pub not_attempted: Vec<String>,
}

impl DistributionResult {
    /// Any node that did not end at the target hash needs another pass.
    pub fn needs_requeue(&self) -> bool {
        !self.failed.is_empty() || !self.not_attempted.is_empty()
    }

    /// Every fleet node ended at the target hash.
    pub fn is_complete(&self) -> bool {
        !self.needs_requeue()
    }

    /// Number of pushes that ran to completion, successful or not.
    pub fn pushes(&self) -> usize {
        self.applied.len() + self.failed.len()
    }

    fn sort(&mut self) {
        self.applied.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.node.cmp(&b.node));
        self.not_attempted.sort();
    }
}

enum PushOutcome {
    Applied,
    Failed(String),
    Cancelled,
}

/// Ensures every fleet node runs the canonical configuration.
pub struct Distributor {
    transport: Arc<dyn NodeTransport>,
    records: ApplyRecordStore,
    max_concurrency: usize,
    push_timeout: Duration,
    config_dir: String,
}

impl Distributor {
    pub fn new(transport: Arc<dyn NodeTransport>, records: ApplyRecordStore, settings: &DistributionConfig) -> Self {
        Self {
            transport,
            records,
            max_concurrency: settings.max_concurrency.max(1),
            push_timeout: Duration::from_secs(settings.push_timeout_secs),
            config_dir: settings.config_dir.clone(),
        }
    }

    pub fn records(&self) -> &ApplyRecordStore {
        &self.records
    }

    /// Push `config` to every node of `fleet` that is not already current.
    ///
    /// Returns once every node has been attempted or the token is cancelled.
    /// Cancellation stops in-flight pushes; those nodes and any not yet
    /// started are reported as not attempted.
    pub async fn apply(
        &self,
        config: &CanonicalRegistryConfig,
        fleet: &[NodeIdentity],
        cancel: &CancellationToken,
    ) -> DistributionResult {
        self.records.prune(fleet);

        let mut result = DistributionResult::default();
        let mut pending = Vec::new();
        for node in fleet {
            if self.records.is_current(&node.name, &config.hash) {
                result.skipped.push(node.name.clone());
            } else {
                self.records.mark_pending(node);
                pending.push(node.clone());
            }
        }

        if !pending.is_empty() {
            tracing::info!(
                pending = pending.len(),
                skipped = result.skipped.len(),
                max_concurrency = self.max_concurrency,
                hash = %config.hash.short(),
                "Distributing registry configuration"
            );
            let artifact = Arc::new(render(config, &self.config_dir));
            self.fan_out(config, pending, artifact, cancel, &mut result).await;
        }

        result.sort();
        metrics::record_nodes_applied(self.records.count_in(ApplyState::Applied));
        result
    }

    async fn fan_out(
        &self,
        config: &CanonicalRegistryConfig,
        pending: Vec<NodeIdentity>,
        artifact: Arc<NodeArtifact>,
        cancel: &CancellationToken,
        result: &mut DistributionResult,
    ) {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut outstanding: HashMap<String, NodeIdentity> = HashMap::new();
        let mut tasks = JoinSet::new();

        for node in pending {
            outstanding.insert(node.name.clone(), node.clone());
            let transport = self.transport.clone();
            let artifact = artifact.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            let timeout = self.push_timeout;
            tasks.spawn(async move {
                let outcome = push_one(transport.as_ref(), &node, &artifact, &permits, &cancel, timeout).await;
                (node, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (node, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(error = %e, "Node push task did not complete");
                    continue;
                }
            };
            outstanding.remove(&node.name);
            self.record_outcome(config, node, outcome, result);
        }

        // Tasks that panicked never reported back.
        for (_, node) in outstanding {
            let outcome = PushOutcome::Failed("push task panicked".to_string());
            self.record_outcome(config, node, outcome, result);
        }
    }

    fn record_outcome(
        &self,
        config: &CanonicalRegistryConfig,
        node: NodeIdentity,
        outcome: PushOutcome,
        result: &mut DistributionResult,
    ) {
        let now = Utc::now();
        match outcome {
            PushOutcome::Applied => {
                self.records.mark_applied(&node, &config.hash, now);
                metrics::record_push("applied");
                tracing::debug!(node = %node.name, generation = config.generation, "Node configuration applied");
                result.applied.push(node.name);
            }
            PushOutcome::Failed(error) => {
                self.records.mark_failed(&node, &error, now);
                metrics::record_push("failed");
                tracing::warn!(node = %node.name, error = %error, "Node configuration push failed");
                result.failed.push(NodeFailure { node: node.name, error });
            }
            PushOutcome::Cancelled => {
                self.records.mark_not_attempted(&node);
                metrics::record_push("not_attempted");
                result.not_attempted.push(node.name);
            }
        }
    }
}

async fn push_one(
    transport: &dyn NodeTransport,
    node: &NodeIdentity,
    artifact: &NodeArtifact,
    permits: &Arc<Semaphore>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> PushOutcome {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return PushOutcome::Cancelled,
        permit = permits.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return PushOutcome::Cancelled,
        },
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => PushOutcome::Cancelled,
        pushed = tokio::time::timeout(timeout, transport.push(node, artifact)) => match pushed {
            Ok(Ok(())) => PushOutcome::Applied,
            Ok(Err(e)) => PushOutcome::Failed(e.to_string()),
            Err(_) => PushOutcome::Failed(
                TransportError::Timeout {
                    node: node.name.clone(),
                    timeout,
                }
                .to_string(),
            ),
        },
    }
}
