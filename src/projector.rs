use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::node::FsNode;
use crate::node::identity::{DocId, identify};
use crate::notification::{Action, ChangeNotification, PathChange};
use crate::store::{DocumentStore, StoreError};

/// Which identifiers a DELETE removes.
///
/// The watcher has been seen reporting a stale `isDir` on deletes, in which case
/// the exact identifier misses the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMatch {
    /// Only `identify(path, isDir)`.
    #[default]
    Exact,
    /// Both the file and the directory identifier for the path.
    AnyKind,
}

/// The store mutation a notification was projected into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Upserted { id: DocId },
    /// `removed` is false when nothing was stored under the identifier(s).
    Deleted { id: DocId, removed: bool },
    Relocated { from: DocId, to: DocId },
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("malformed rename path {0:?}: expected exactly one \" -> \" separator")]
    MalformedPath(String),
    #[error("rename source {0} is not in the store")]
    SourceMissing(DocId),
    #[error("unsupported action {0:?}")]
    UnsupportedAction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProjectionError {
    /// Whether redelivering the same notification could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProjectionError::Store(err) => !err.is_permanent(),
            ProjectionError::SourceMissing(_) => true,
            ProjectionError::MalformedPath(_) | ProjectionError::UnsupportedAction(_) => false,
        }
    }
}

/// Applies one notification to the store.
#[async_trait]
pub trait Projector: Send + Sync {
    async fn apply(&self, notification: &ChangeNotification)
    -> Result<Projection, ProjectionError>;
}

/// Turns change notifications into store mutations. Stateless between
/// notifications; does not log.
pub struct ChangeProjector {
    store: Arc<dyn DocumentStore>,
    delete_match: DeleteMatch,
}

impl ChangeProjector {
    pub fn new(store: Arc<dyn DocumentStore>, delete_match: DeleteMatch) -> Self {
        Self {
            store,
            delete_match,
        }
    }

    /// Upsert the node; redelivery overwrites with identical fields.
    async fn create(&self, n: &ChangeNotification) -> Result<Projection, ProjectionError> {
        let node = FsNode::new(&n.path, n.is_dir, &n.watch_folder);
        let id = node.id();
        self.store.save(&id, &node).await?;
        Ok(Projection::Upserted { id })
    }

    async fn delete(&self, n: &ChangeNotification) -> Result<Projection, ProjectionError> {
        let id = identify(&n.path, n.is_dir);
        let mut removed = self.store.delete(&id).await?;
        if self.delete_match == DeleteMatch::AnyKind {
            removed |= self.store.delete(&identify(&n.path, !n.is_dir)).await?;
        }
        Ok(Projection::Deleted { id, removed })
    }

    /// Delete the old document, then save it again under the new path.
    ///
    /// Old goes first so two live documents never exist for one entity. A crash
    /// between the two steps loses the entity until the event is re-emitted.
    async fn relocate(&self, n: &ChangeNotification) -> Result<Projection, ProjectionError> {
        let change =
            PathChange::parse(&n.path).ok_or_else(|| ProjectionError::MalformedPath(n.path.clone()))?;

        let from = identify(change.old, n.is_dir);
        let mut node = self
            .store
            .get(&from)
            .await?
            .ok_or_else(|| ProjectionError::SourceMissing(from.clone()))?;

        self.store.delete(&from).await?;

        node.relocate(change.new);
        let to = identify(change.new, n.is_dir);
        self.store.save(&to, &node).await?;

        Ok(Projection::Relocated { from, to })
    }
}

#[async_trait]
impl Projector for ChangeProjector {
    async fn apply(
        &self,
        notification: &ChangeNotification,
    ) -> Result<Projection, ProjectionError> {
        match notification.action {
            Action::Create => self.create(notification).await,
            Action::Delete => self.delete(notification).await,
            Action::Rename | Action::Move => self.relocate(notification).await,
        }
    }
}
