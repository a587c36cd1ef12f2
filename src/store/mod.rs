pub mod elastic;
pub mod mapping;
pub mod memory;

use async_trait::async_trait;

use crate::node::FsNode;
use crate::node::identity::DocId;

pub use elastic::ElasticStore;
pub use memory::MemoryStore;

/// The two listing shapes the query surface needs. Results are always sorted
/// ascending by `fullPath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    All,
    /// Nodes whose index key starts with the index key of this absolute path.
    Subtree(String),
}

/// Matched nodes plus the store's total match count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub nodes: Vec<FsNode>,
    pub total: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed store response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid store url {0}")]
    InvalidUrl(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// A client-side rejection the store will repeat for the same request,
    /// such as an over-long id or a mapping conflict. 408 and 429 are transient.
    pub fn is_permanent(&self) -> bool {
        match self {
            StoreError::Rejected { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}

/// Narrow interface over the indexed document store.
///
/// Implementations provide their own concurrency safety; callers add no locking.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upsert `node` under `id`.
    async fn save(&self, id: &DocId, node: &FsNode) -> Result<(), StoreError>;

    /// Remove the document. A missing id is not an error; returns whether a
    /// document was actually removed.
    async fn delete(&self, id: &DocId) -> Result<bool, StoreError>;

    async fn get(&self, id: &DocId) -> Result<Option<FsNode>, StoreError>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> StoreError {
        StoreError::Rejected {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_client_rejections_are_permanent() {
        assert!(rejected(400).is_permanent());
        assert!(rejected(409).is_permanent());
        assert!(!rejected(408).is_permanent());
        assert!(!rejected(429).is_permanent());
        assert!(!rejected(503).is_permanent());
        assert!(!StoreError::Unavailable("down".into()).is_permanent());
    }
}
