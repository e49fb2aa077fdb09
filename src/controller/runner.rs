//! Requeue-aware controller loop driving reconcile passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::StaticFleet;
use crate::config::{ControllerConfig, WatchEvent};
use crate::reconcile::Reconcile;
use crate::resilience::RequeueBackoff;
use crate::CONTROLLER_NAME;

/// Schedules reconcile passes for one reconciler.
pub struct Controller<R: Reconcile> {
    reconciler: R,
    fleet: Option<Arc<StaticFleet>>,
    resync: Duration,
    backoff: RequeueBackoff,
}

impl<R: Reconcile> Controller<R> {
    pub fn new(reconciler: R, settings: &ControllerConfig) -> Self {
        Self {
            reconciler,
            fleet: None,
            resync: Duration::from_secs(settings.resync_secs),
            backoff: RequeueBackoff::new(settings.backoff_base_ms, settings.backoff_max_ms),
        }
    }

    /// Fleet to update when a reloaded config arrives.
    pub fn with_fleet(mut self, fleet: Arc<StaticFleet>) -> Self {
        self.fleet = Some(fleet);
        self
    }

    /// Run until `cancel` fires. Returns the reconciler for inspection.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>, cancel: CancellationToken) -> R {
        tracing::info!(controller = CONTROLLER_NAME, resync_secs = self.resync.as_secs(), "Controller started");

        let mut next_pass = Instant::now();
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.handle(event);
                        while let Ok(event) = events.try_recv() {
                            self.handle(event);
                        }
                        next_pass = Instant::now();
                    }
                    None => events_open = false,
                },
                _ = tokio::time::sleep_until(next_pass) => {
                    let delay = self.pass(&cancel).await;
                    next_pass = Instant::now() + delay;
                }
            }
        }

        tracing::info!(controller = CONTROLLER_NAME, "Controller stopped");
        self.reconciler
    }

    fn handle(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::ConfigReloaded(config) => match &self.fleet {
                Some(fleet) => {
                    let nodes = fleet.replace(config.fleet.nodes);
                    tracing::info!(nodes, "Fleet membership reloaded");
                }
                None => tracing::debug!("Config reloaded; no live fleet to update"),
            },
            WatchEvent::SourcesChanged => tracing::debug!("Mirror rule sources changed"),
        }
    }

    /// Run one pass and return the delay before the next.
    async fn pass(&mut self, cancel: &CancellationToken) -> Duration {
        match self.reconciler.reconcile_once(cancel).await {
            Ok(outcome) if outcome.requeue => {
                let delay = self.backoff.next_delay();
                tracing::info!(
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    failed = outcome.report.failed.len(),
                    not_attempted = outcome.report.not_attempted.len(),
                    "Requeueing reconcile pass"
                );
                delay
            }
            Ok(_) => {
                self.backoff.reset();
                self.resync
            }
            Err(e) if e.requeue() => {
                let delay = self.backoff.next_delay();
                tracing::warn!(
                    error = %e,
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "Reconcile pass failed; will retry"
                );
                delay
            }
            Err(e) => {
                tracing::error!(error = %e, "Reconcile pass aborted");
                self.backoff.reset();
                self.resync
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::distribute::NodeIdentity;
    use crate::merge::ConfigHash;
    use crate::reconcile::{PassOutcome, PassReport, ReconcileError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Requeues the first `requeues` passes, then converges.
    struct FakeReconciler {
        calls: Arc<AtomicUsize>,
        requeues: usize,
    }

    #[async_trait]
    impl Reconcile for FakeReconciler {
        async fn reconcile_once(&mut self, _cancel: &CancellationToken) -> Result<PassOutcome, ReconcileError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PassOutcome {
                requeue: call < self.requeues,
                report: PassReport {
                    pass_id: uuid::Uuid::new_v4(),
                    hash: ConfigHash::from("abc"),
                    generation: 1,
                    registries: 0,
                    conflicts: 0,
                    applied: 0,
                    skipped: 0,
                    failed: Vec::new(),
                    not_attempted: Vec::new(),
                    service_cidr: None,
                },
            })
        }
    }

    fn settings() -> ControllerConfig {
        ControllerConfig {
            resync_secs: 3600,
            backoff_base_ms: 5,
            backoff_max_ms: 20,
        }
    }

    async fn wait_for(calls: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while calls.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("controller did not run enough passes");
    }

    #[tokio::test]
    async fn test_requeues_until_converged_then_waits_for_resync() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(
            FakeReconciler {
                calls: calls.clone(),
                requeues: 2,
            },
            &settings(),
        );
        let (_tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(controller.run(rx, cancel.clone()));

        wait_for(&calls, 3).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_source_change_triggers_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(
            FakeReconciler {
                calls: calls.clone(),
                requeues: 0,
            },
            &settings(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(controller.run(rx, cancel.clone()));

        wait_for(&calls, 1).await;
        tx.send(WatchEvent::SourcesChanged).unwrap();
        tx.send(WatchEvent::SourcesChanged).unwrap();
        wait_for(&calls, 2).await;

        cancel.cancel();
        handle.await.unwrap();
        assert!(calls.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_config_reload_replaces_fleet() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fleet = Arc::new(StaticFleet::new(vec![NodeIdentity::new("win-a", "")]));
        let controller = Controller::new(
            FakeReconciler {
                calls: calls.clone(),
                requeues: 0,
            },
            &settings(),
        )
        .with_fleet(fleet.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(controller.run(rx, cancel.clone()));

        wait_for(&calls, 1).await;
        let mut config = DaemonConfig::default();
        config.fleet.nodes = vec![NodeIdentity::new("win-a", ""), NodeIdentity::new("win-b", "")];
        tx.send(WatchEvent::ConfigReloaded(Box::new(config))).unwrap();
        wait_for(&calls, 2).await;

        assert_eq!(fleet.len(), 2);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller = Controller::new(
            FakeReconciler {
                calls: calls.clone(),
                requeues: usize::MAX,
            },
            &settings(),
        );
        let (_tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reconciler = tokio::time::timeout(Duration::from_secs(1), controller.run(rx, cancel))
            .await
            .unwrap();
        assert_eq!(reconciler.calls.load(Ordering::SeqCst), 0);
    }
}
