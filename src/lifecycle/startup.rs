//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the apply record store (restoring state from disk)
//! - Build the shipped collaborators from the config sections
//! - Assemble the reconciler and hand back the live fleet for hot reload
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Collaborators are trait objects so other hosts can swap them

use std::sync::Arc;

use crate::cluster::{StaticFleet, StaticNetwork};
use crate::config::DaemonConfig;
use crate::distribute::{ApplyRecordStore, DirectoryTransport, Distributor};
use crate::observability::LogEventRecorder;
use crate::reconcile::Reconciler;
use crate::rules::{ManifestStore, MirrorRuleSource};

/// Everything the controller needs to run.
pub struct Components {
    pub reconciler: Reconciler,
    /// Shared with the reconciler; replaced on config reload.
    pub fleet: Arc<StaticFleet>,
}

/// Wire the daemon from a validated configuration.
pub fn build(config: &DaemonConfig) -> std::io::Result<Components> {
    let records = match &config.state.records_path {
        Some(path) => ApplyRecordStore::load_from_file(path)?,
        None => ApplyRecordStore::new(None),
    };

    let store = Arc::new(ManifestStore::new(&config.sources.manifests_dir));
    let fleet = Arc::new(StaticFleet::new(config.fleet.nodes.clone()));
    let network = Arc::new(StaticNetwork::new(config.cluster.service_cidr.clone()));
    let transport = Arc::new(DirectoryTransport::new(&config.distribution.output_root));
    let distributor = Distributor::new(transport, records, &config.distribution);

    tracing::info!(
        manifests = %config.sources.manifests_dir.display(),
        nodes = fleet.len(),
        output_root = %config.distribution.output_root.display(),
        service_cidr = config.cluster.service_cidr.as_deref().unwrap_or("unknown"),
        "Components initialized"
    );

    let reconciler = Reconciler::new(
        MirrorRuleSource::new(store),
        fleet.clone(),
        network,
        distributor,
        Arc::new(LogEventRecorder),
    );

    Ok(Components { reconciler, fleet })
}
