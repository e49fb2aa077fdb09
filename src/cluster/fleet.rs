//! Fleet membership.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::cluster::StoreError;
use crate::distribute::NodeIdentity;

/// Source of the set of nodes that must receive the canonical configuration.
#[async_trait]
pub trait Fleet: Send + Sync {
    /// Current fleet members.
    async fn nodes(&self) -> Result<Vec<NodeIdentity>, StoreError>;
}

/// Fleet declared in the daemon configuration.
///
/// Membership is swapped atomically when the configuration file is reloaded,
/// so a pass always sees one consistent list.
#[derive(Debug)]
pub struct StaticFleet {
    nodes: ArcSwap<Vec<NodeIdentity>>,
}

impl StaticFleet {
    pub fn new(nodes: Vec<NodeIdentity>) -> Self {
        Self {
            nodes: ArcSwap::from_pointee(nodes),
        }
    }

    /// Replace the membership list, returning the number of nodes now tracked.
    pub fn replace(&self, nodes: Vec<NodeIdentity>) -> usize {
        let count = nodes.len();
        self.nodes.store(Arc::new(nodes));
        count
    }

    pub fn len(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Fleet for StaticFleet {
    async fn nodes(&self) -> Result<Vec<NodeIdentity>, StoreError> {
        Ok(self.nodes.load_full().as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_membership() {
        let fleet = StaticFleet::new(vec![NodeIdentity::new("win-a", "10.0.0.1")]);
        assert_eq!(fleet.nodes().await.unwrap().len(), 1);

        let count = fleet.replace(vec![
            NodeIdentity::new("win-a", "10.0.0.1"),
            NodeIdentity::new("win-b", "10.0.0.2"),
        ]);
        assert_eq!(count, 2);

        let names: Vec<String> = fleet.nodes().await.unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["win-a", "win-b"]);
    }
}
