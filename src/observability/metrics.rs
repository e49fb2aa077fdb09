//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_reconcile_passes_total` (counter): passes by outcome
//!   (`converged`, `requeued`, `source_unavailable`, `fleet_unavailable`, `invariant_violation`, `persist_failed`)
//! - `mirror_conflicts_total` (counter): conflicting rule pairs detected by merge
//! - `mirror_node_pushes_total` (counter): node pushes by result
//!   (`applied`, `failed`, `not_attempted`)
//! - `mirror_nodes_applied` (gauge): nodes whose record is `applied`
//! - `mirror_config_generation` (gauge): generation of the last distributed config
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so library code and
//!   tests call these freely

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_pass(outcome: &'static str) {
    metrics::counter!("mirror_reconcile_passes_total", "outcome" => outcome).increment(1);
}

pub fn record_conflicts(count: usize) {
    if count > 0 {
        metrics::counter!("mirror_conflicts_total").increment(count as u64);
    }
}

pub fn record_push(result: &'static str) {
    metrics::counter!("mirror_node_pushes_total", "result" => result).increment(1);
}

pub fn record_nodes_applied(count: usize) {
    metrics::gauge!("mirror_nodes_applied").set(count as f64);
}

pub fn record_generation(generation: u64) {
    metrics::gauge!("mirror_config_generation").set(generation as f64);
}
