use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::{Disposition, Handled, Ingress, RetryPolicy};
use crate::projector::ProjectionError;
use crate::transport::TransportError;

/// One message as handed over by the transport. Must be settled exactly once.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    async fn ack(&self) -> Result<(), TransportError>;

    async fn reject(&self, requeue: bool) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Advisory: overruns are logged, the in-flight handling still completes.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Counters for one worker loop, returned when its delivery stream ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub acked: usize,
    pub rejected: usize,
    pub requeued: usize,
    pub timed_out: usize,
    pub stream_errors: usize,
}

/// Consume one binding's deliveries sequentially until the stream ends.
///
/// No two deliveries from the same stream are handled concurrently; separate
/// bindings each get their own loop.
pub async fn run_binding<S, D>(
    binding: &str,
    mut deliveries: S,
    ingress: Ingress,
    options: WorkerOptions,
) -> WorkerStats
where
    S: Stream<Item = Result<D, TransportError>> + Unpin + Send,
    D: Delivery,
{
    let mut stats = WorkerStats::default();

    while let Some(next) = deliveries.next().await {
        let delivery = match next {
            Ok(d) => d,
            Err(err) => {
                tracing::error!(binding, error = %err, "delivery stream error");
                stats.stream_errors += 1;
                continue;
            }
        };

        tracing::debug!(binding, "reading delivery");
        let (outcome, timed_out) =
            handle_with_deadline(&ingress, delivery.payload(), options.timeout).await;
        if timed_out {
            stats.timed_out += 1;
        }

        log_outcome(binding, &outcome);

        let disposition = options.retry.disposition(&outcome);
        let settled = match disposition {
            Disposition::Ack => {
                stats.acked += 1;
                delivery.ack().await
            }
            Disposition::Reject { requeue } => {
                stats.rejected += 1;
                if requeue {
                    stats.requeued += 1;
                }
                delivery.reject(requeue).await
            }
        };
        if let Err(err) = settled {
            tracing::error!(binding, error = %err, ?disposition, "failed to settle delivery");
        }
    }

    tracing::warn!(binding, ?stats, "delivery stream closed");
    stats
}

/// Run the handler; once `timeout` elapses, mark the attempt as timed out but
/// keep awaiting it, since store calls are not cancellable mid-flight.
async fn handle_with_deadline(
    ingress: &Ingress,
    payload: &[u8],
    timeout: Duration,
) -> (Result<Handled, ProjectionError>, bool) {
    let handling = ingress.handle(payload);
    tokio::pin!(handling);

    tokio::select! {
        outcome = &mut handling => (outcome, false),
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "message handling timed out");
            (handling.await, true)
        }
    }
}

fn log_outcome(binding: &str, outcome: &Result<Handled, ProjectionError>) {
    match outcome {
        Ok(Handled::Applied(projection)) => {
            tracing::info!(binding, ?projection, "applied notification");
        }
        Ok(Handled::Discarded) => {}
        Err(err @ ProjectionError::UnsupportedAction(_)) => {
            tracing::error!(binding, error = %err, "notification schema mismatch");
        }
        Err(err) if err.is_retryable() => {
            tracing::warn!(binding, error = %err, "failed to apply notification");
        }
        Err(err) => {
            tracing::error!(binding, error = %err, "rejected notification");
        }
    }
}
