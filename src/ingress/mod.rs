pub mod worker;

use std::sync::Arc;

use serde::Deserialize;

use crate::notification::{ChangeNotification, DecodeError};
use crate::projector::{Projection, ProjectionError, Projector};

/// What became of one payload that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Applied(Projection),
    /// Undecodable payload, logged and dropped. Retrying cannot fix it.
    Discarded,
}

/// How the transport should settle a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject { requeue: bool },
}

/// Which failures go back on the queue for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Store unavailable or write rejected.
    pub requeue_on_store_error: bool,
    /// Rename/move whose source document is not stored (yet).
    pub requeue_on_missing_source: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            requeue_on_store_error: true,
            requeue_on_missing_source: false,
        }
    }
}

impl RetryPolicy {
    pub fn disposition(&self, outcome: &Result<Handled, ProjectionError>) -> Disposition {
        match outcome {
            Ok(_) => Disposition::Ack,
            Err(ProjectionError::Store(err)) => Disposition::Reject {
                requeue: self.requeue_on_store_error && !err.is_permanent(),
            },
            Err(ProjectionError::SourceMissing(_)) => Disposition::Reject {
                requeue: self.requeue_on_missing_source,
            },
            Err(ProjectionError::MalformedPath(_) | ProjectionError::UnsupportedAction(_)) => {
                Disposition::Reject { requeue: false }
            }
        }
    }
}

/// Decodes raw payloads and drives the projector once per message.
#[derive(Clone)]
pub struct Ingress {
    projector: Arc<dyn Projector>,
}

impl Ingress {
    pub fn new(projector: Arc<dyn Projector>) -> Self {
        Self { projector }
    }

    pub async fn handle(&self, payload: &[u8]) -> Result<Handled, ProjectionError> {
        let notification = match ChangeNotification::decode(payload) {
            Ok(n) => n,
            Err(DecodeError::UnsupportedAction(action)) => {
                return Err(ProjectionError::UnsupportedAction(action));
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    payload = %String::from_utf8_lossy(payload),
                    "can't decode folder watch notification"
                );
                return Ok(Handled::Discarded);
            }
        };

        tracing::debug!(
            action = notification.action.as_str(),
            path = %notification.path,
            is_dir = notification.is_dir,
            "handling folder watch notification"
        );

        let projection = self.projector.apply(&notification).await?;
        Ok(Handled::Applied(projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::identity::identify;
    use crate::projector::{ChangeProjector, DeleteMatch};
    use crate::store::{DocumentStore, MemoryStore, StoreError};

    fn ingress() -> (Arc<MemoryStore>, Ingress) {
        let store = Arc::new(MemoryStore::new());
        let projector = ChangeProjector::new(store.clone(), DeleteMatch::Exact);
        (store, Ingress::new(Arc::new(projector)))
    }

    #[tokio::test]
    async fn test_garbage_is_discarded_without_mutation() {
        let (store, ingress) = ingress();
        let out = ingress.handle(b"{\"action\": ").await.unwrap();
        assert_eq!(out, Handled::Discarded);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsupported_action_is_surfaced() {
        let (store, ingress) = ingress();
        let err = ingress
            .handle(br#"{"action":"CHMOD","path":"/w/a","isDir":"false","watchFolder":"/w"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectionError::UnsupportedAction(ref a) if a == "CHMOD"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_dispatches_create_then_rename() {
        let (store, ingress) = ingress();
        ingress
            .handle(br#"{"action":"CREATE","path":"/w/a.pdf","isDir":"false","watchFolder":"/w"}"#)
            .await
            .unwrap();
        let out = ingress
            .handle(br#"{"action":"RENAME","path":"/w/a.pdf -> /w/b.pdf","isDir":"false","watchFolder":"/w"}"#)
            .await
            .unwrap();

        assert!(matches!(out, Handled::Applied(Projection::Relocated { .. })));
        assert!(store.get(&identify("/w/b.pdf", false)).await.unwrap().is_some());
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_retry_policy_dispositions() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.disposition(&Ok(Handled::Discarded)), Disposition::Ack);
        assert_eq!(
            policy.disposition(&Err(ProjectionError::Store(StoreError::Unavailable("x".into())))),
            Disposition::Reject { requeue: true }
        );
        assert_eq!(
            policy.disposition(&Err(ProjectionError::SourceMissing(identify("/a", false)))),
            Disposition::Reject { requeue: false }
        );
        assert_eq!(
            policy.disposition(&Err(ProjectionError::MalformedPath("/a".into()))),
            Disposition::Reject { requeue: false }
        );

        let eager = RetryPolicy {
            requeue_on_store_error: false,
            requeue_on_missing_source: true,
        };
        assert_eq!(
            eager.disposition(&Err(ProjectionError::SourceMissing(identify("/a", false)))),
            Disposition::Reject { requeue: true }
        );
        assert_eq!(
            eager.disposition(&Err(ProjectionError::Store(StoreError::Unavailable("x".into())))),
            Disposition::Reject { requeue: false }
        );
    }

    #[test]
    fn test_permanent_store_rejection_is_not_requeued() {
        let policy = RetryPolicy::default();
        let rejected = |status| {
            Err(ProjectionError::Store(StoreError::Rejected {
                status,
                body: "id is too long".into(),
            }))
        };
        assert_eq!(
            policy.disposition(&rejected(400)),
            Disposition::Reject { requeue: false }
        );
        assert_eq!(
            policy.disposition(&rejected(429)),
            Disposition::Reject { requeue: true }
        );
        assert_eq!(
            policy.disposition(&rejected(502)),
            Disposition::Reject { requeue: true }
        );
    }
}
