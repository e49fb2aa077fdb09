//! Cluster network metadata.

/// Read-only view of cluster networking. Informational only: the service
/// CIDR is reported with each pass and never influences the merge.
pub trait ClusterNetwork: Send + Sync {
    fn service_cidr(&self) -> Option<String>;
}

/// Network info captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticNetwork {
    service_cidr: Option<String>,
}

impl StaticNetwork {
    pub fn new(service_cidr: Option<String>) -> Self {
        Self { service_cidr }
    }
}

impl ClusterNetwork for StaticNetwork {
    fn service_cidr(&self) -> Option<String> {
        self.service_cidr.clone()
    }
}
