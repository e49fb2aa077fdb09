//! Reconcile pass errors and how the controller treats them.

use thiserror::Error;

use crate::cluster::StoreError;
use crate::rules::SourceError;

/// Why a reconcile pass stopped early.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Rule sources could not be read. Nothing was changed.
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),

    #[error("Fleet membership unavailable: {0}")]
    FleetUnavailable(#[source] StoreError),

    /// The merged configuration is internally inconsistent.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Every node converged but the apply records could not be saved.
    #[error("Saving node apply records failed: {0}")]
    Persist(#[source] std::io::Error),
}

impl ReconcileError {
    /// Whether the host should schedule another pass after a backoff.
    pub fn requeue(&self) -> bool {
        !matches!(self, ReconcileError::InvariantViolation(_))
    }

    /// Label used for the pass outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReconcileError::SourceUnavailable(_) => "source_unavailable",
            ReconcileError::FleetUnavailable(_) => "fleet_unavailable",
            ReconcileError::InvariantViolation(_) => "invariant_violation",
            ReconcileError::Persist(_) => "persist_failed",
        }
    }
}
