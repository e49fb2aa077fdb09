//! Operator-facing events emitted by the reconciler.

use crate::distribute::NodeFailure;
use crate::merge::{ConfigHash, ConflictWarning};
use crate::reconcile::PassReport;
use crate::CONTROLLER_NAME;

/// Sink for reconcile events.
pub trait EventRecorder: Send + Sync {
    /// Two resources of the same kind disagree about a source's mirrors.
    fn conflict_detected(&self, conflict: &ConflictWarning);

    /// A node did not accept the configuration with `hash`.
    fn distribution_failed(&self, failure: &NodeFailure, hash: &ConfigHash);

    fn pass_completed(&self, report: &PassReport);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventRecorder;

impl EventRecorder for LogEventRecorder {
    fn conflict_detected(&self, conflict: &ConflictWarning) {
        tracing::warn!(
            controller = CONTROLLER_NAME,
            reference = %conflict.reference,
            kind = %conflict.kind,
            winner = %conflict.winner,
            loser = %conflict.loser,
            "Conflicting mirror rules"
        );
    }

    fn distribution_failed(&self, failure: &NodeFailure, hash: &ConfigHash) {
        tracing::warn!(
            controller = CONTROLLER_NAME,
            node = %failure.node,
            hash = %hash.short(),
            error = %failure.error,
            "Registry configuration not applied"
        );
    }

    fn pass_completed(&self, report: &PassReport) {
        tracing::info!(
            controller = CONTROLLER_NAME,
            hash = %report.hash.short(),
            generation = report.generation,
            registries = report.registries,
            conflicts = report.conflicts,
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed.len(),
            not_attempted = report.not_attempted.len(),
            service_cidr = report.service_cidr.as_deref().unwrap_or("unknown"),
            "Reconcile pass completed"
        );
    }
}
