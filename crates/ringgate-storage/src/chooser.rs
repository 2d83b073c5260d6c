//! Client-side contract against the out-of-scope storage-node
//! inventory service: it chooses candidate storage-node sets for a
//! write (`findSharks`, §4.6).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageNodeDescriptor {
    pub storage_id: String,
    pub datacenter: String,
    pub base_url: String,
}

#[derive(Debug, Error)]
pub enum ChooserError {
    #[error("no storage nodes available")]
    NoNodesAvailable,
    #[error("unknown storage node: {0}")]
    UnknownNode(String),
}

/// Returns one or more ordered candidate sets, each containing
/// `durability_level` nodes, for `startSharkStreams` to try in order
/// until one set fully succeeds. Also resolves a previously-recorded
/// shark's `storage_id` back to a reachable descriptor for reads,
/// since the inventory service is the only thing that knows current
/// addresses.
#[async_trait]
pub trait StorageNodeChooser: Send + Sync {
    async fn choose(
        &self,
        durability_level: u8,
    ) -> Result<Vec<Vec<StorageNodeDescriptor>>, ChooserError>;

    async fn resolve(&self, storage_id: &str) -> Result<StorageNodeDescriptor, ChooserError>;
}

/// In-memory test double, for exercising the Request Pipeline without a
/// real inventory service.
pub struct FakeStorageNodeChooser {
    pub candidate_sets: Vec<Vec<StorageNodeDescriptor>>,
}

impl FakeStorageNodeChooser {
    #[must_use]
    pub fn new(candidate_sets: Vec<Vec<StorageNodeDescriptor>>) -> Self {
        Self { candidate_sets }
    }
}

#[async_trait]
impl StorageNodeChooser for FakeStorageNodeChooser {
    async fn choose(
        &self,
        _durability_level: u8,
    ) -> Result<Vec<Vec<StorageNodeDescriptor>>, ChooserError> {
        if self.candidate_sets.is_empty() {
            return Err(ChooserError::NoNodesAvailable);
        }
        Ok(self.candidate_sets.clone())
    }

    async fn resolve(&self, storage_id: &str) -> Result<StorageNodeDescriptor, ChooserError> {
        self.candidate_sets
            .iter()
            .flatten()
            .find(|n| n.storage_id == storage_id)
            .cloned()
            .ok_or_else(|| ChooserError::UnknownNode(storage_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> StorageNodeDescriptor {
        StorageNodeDescriptor {
            storage_id: id.to_string(),
            datacenter: "dc1".to_string(),
            base_url: format!("https://{id}.example"),
        }
    }

    #[tokio::test]
    async fn resolve_finds_node_across_candidate_sets() {
        let chooser = FakeStorageNodeChooser::new(vec![vec![node("a"), node("b")], vec![node("c")]]);
        let found = chooser.resolve("c").await.unwrap();
        assert_eq!(found.storage_id, "c");
    }

    #[tokio::test]
    async fn resolve_unknown_node_errors() {
        let chooser = FakeStorageNodeChooser::new(vec![vec![node("a")]]);
        assert!(matches!(
            chooser.resolve("missing").await,
            Err(ChooserError::UnknownNode(_))
        ));
    }
}
