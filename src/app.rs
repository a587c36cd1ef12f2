use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::api;
use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::ingress::worker::{WorkerOptions, WorkerStats, run_binding};
use crate::ingress::{Handled, Ingress};
use crate::output::ReplaySummary;
use crate::projector::ChangeProjector;
use crate::store::{DocumentStore, ElasticStore, MemoryStore, SearchQuery};
use crate::transport::AmqpTransport;

/// Open the configured store backend.
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    Ok(match config.backend {
        StoreBackend::Elastic => Arc::new(
            ElasticStore::connect(config)
                .await
                .with_context(|| format!("failed to connect to Elasticsearch at {}", config.url))?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; documents are lost on exit");
            Arc::new(MemoryStore::new())
        }
    })
}

/// Wire the ingress for `store` from the ingest settings.
pub fn build_ingress(config: &AppConfig, store: Arc<dyn DocumentStore>) -> Ingress {
    Ingress::new(Arc::new(ChangeProjector::new(
        store,
        config.ingest.delete_match,
    )))
}

/// Run one worker per binding and the query API until Ctrl-C, or until a
/// consumer stops.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = open_store(&config.store).await?;
    let ingress = build_ingress(&config, store.clone());
    let options = WorkerOptions {
        timeout: config.ingest.handler_timeout(),
        retry: config.ingest.retry,
    };

    let transport = AmqpTransport::connect(&config.amqp)
        .await
        .context("failed to connect to RabbitMQ")?;

    let mut workers = JoinSet::new();
    for binding in &config.amqp.bindings {
        match transport.consume(&config.amqp.exchange, binding).await {
            Ok(deliveries) => {
                let ingress = ingress.clone();
                let queue = binding.queue.clone();
                workers.spawn(async move {
                    let stats = run_binding(&queue, deliveries, ingress, options).await;
                    (queue, stats)
                });
            }
            Err(err) => {
                tracing::error!(
                    queue = %binding.queue,
                    routing_key = %binding.routing_key,
                    error = %err,
                    "problem setting up binding, skipping it"
                );
            }
        }
    }
    if workers.is_empty() {
        tracing::warn!("no bindings are being consumed; serving queries only");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    let router = api::router(store);
    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };
    let outcome = supervise(server, &mut workers).await;

    if let Err(err) = transport.close().await {
        tracing::warn!(error = %err, "failed to close rabbitmq connection");
    }
    workers.abort_all();
    while workers.join_next().await.is_some() {}
    outcome
}

/// Wait for the API server to stop, failing early if any consumer ends first.
///
/// A consumer only ends when its delivery stream closes, so the mirror would
/// silently go stale while queries keep being answered.
async fn supervise<F>(
    server: F,
    workers: &mut JoinSet<(String, WorkerStats)>,
) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);
    tokio::select! {
        served = &mut server => served.context("api server failed"),
        Some(joined) = workers.join_next(), if !workers.is_empty() => Err(match joined {
            Ok((queue, stats)) => {
                tracing::error!(queue = %queue, ?stats, "consumer stopped, ingestion halted");
                anyhow::anyhow!("consumer for queue {queue} stopped")
            }
            Err(err) => {
                tracing::error!(error = %err, "consumer task failed");
                anyhow::Error::new(err).context("consumer task failed")
            }
        }),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Drive every notification line in `input` (`-` for stdin) through the ingress.
pub async fn replay(config: &AppConfig, input: &Path) -> anyhow::Result<ReplaySummary> {
    let start = Instant::now();
    let store = open_store(&config.store).await?;
    let ingress = build_ingress(config, store.clone());

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if input == Path::new("-") {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("failed to open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut summary = ReplaySummary::default();
    // Raw bytes: a line that is not valid UTF-8 is discarded by the ingress
    // like any other undecodable payload.
    let mut lines = reader.split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;
        match ingress.handle(line).await {
            Ok(Handled::Applied(_)) => summary.applied += 1,
            Ok(Handled::Discarded) => {
                eprintln!("line {}: not a valid notification, skipped", summary.lines);
                summary.discarded += 1;
            }
            Err(err) => {
                eprintln!("line {}: {}", summary.lines, err);
                summary.failed += 1;
            }
        }
    }

    summary.documents = store.search(&SearchQuery::All).await?.total;
    summary.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(summary)
}
