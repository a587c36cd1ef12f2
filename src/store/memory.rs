use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, SearchHits, SearchQuery, StoreError};
use crate::node::FsNode;
use crate::node::identity::{DocId, is_within};

/// Process-local store with the same contract as the indexed backend: exact-id
/// lookup, path-sorted listing and whole-segment subtree matching.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<DocId, FsNode>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    pub async fn contains(&self, id: &DocId) -> bool {
        self.docs.read().await.contains_key(id)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, id: &DocId, node: &FsNode) -> Result<(), StoreError> {
        self.docs.write().await.insert(id.clone(), node.clone());
        Ok(())
    }

    async fn delete(&self, id: &DocId) -> Result<bool, StoreError> {
        Ok(self.docs.write().await.remove(id).is_some())
    }

    async fn get(&self, id: &DocId) -> Result<Option<FsNode>, StoreError> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, StoreError> {
        let docs = self.docs.read().await;
        let mut nodes: Vec<FsNode> = docs
            .values()
            .filter(|node| match query {
                SearchQuery::All => true,
                SearchQuery::Subtree(prefix) => is_within(&node.full_path, prefix),
            })
            .cloned()
            .collect();
        // Same path as file and dir can coexist; keep dirs first for a stable order.
        nodes.sort_by(|a, b| {
            a.full_path
                .cmp(&b.full_path)
                .then_with(|| b.is_dir.cmp(&a.is_dir))
        });
        Ok(SearchHits {
            total: nodes.len() as u64,
            nodes,
        })
    }
}
