use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, BindingConfig, StoreBackend};
use crate::projector::DeleteMatch;

/// Mirrors watched folders into a searchable document store.
///
/// Consumes file-watcher change notifications from RabbitMQ, projects them into
/// Elasticsearch, and serves the result over a small REST API.
#[derive(Parser, Debug)]
#[command(
    name = "watch-aggregator",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume notifications and serve the query API.
    Serve,

    /// Apply newline-delimited notifications from a file (or `-` for stdin).
    ///
    /// Uses the same decoding and projection as the queue consumer; useful to
    /// re-emit events after a partial failure.
    Replay {
        /// File of JSON notifications, one per line.
        input: PathBuf,

        /// Output the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Command-line and environment overrides, applied over the config file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Config file (TOML). Defaults to ./watch-aggregator.toml when present.
    #[arg(long, short = 'c', env = "AGGREGATOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Development mode: human-readable logs at info level.
    #[arg(long, env = "DEV", global = true)]
    pub dev: bool,

    /// Debug-level logging.
    #[arg(long, short = 'v', env = "VERBOSE", global = true)]
    pub verbose: bool,

    #[arg(long, env = "RABBITMQ_HOST", global = true)]
    pub rabbit_mq_host: Option<String>,

    #[arg(long, env = "RABBITMQ_PORT", global = true)]
    pub rabbit_mq_port: Option<u16>,

    #[arg(long, env = "RABBITMQ_USER", global = true)]
    pub rabbit_mq_user: Option<String>,

    #[arg(long, env = "RABBITMQ_PASSWORD", hide_env_values = true, global = true)]
    pub rabbit_mq_password: Option<String>,

    #[arg(long, global = true)]
    pub rabbit_mq_exchange: Option<String>,

    /// Replaces the configured bindings with a single queue.
    #[arg(long, global = true)]
    pub rabbit_mq_queue: Option<String>,

    /// Routing key for `--rabbit-mq-queue`.
    #[arg(long, global = true)]
    pub rabbit_mq_routing_key: Option<String>,

    /// Document store backend.
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreBackend>,

    /// Elasticsearch URL.
    #[arg(long, short = 'u', env = "ES_URL", global = true)]
    pub es_url: Option<String>,

    /// Elasticsearch index.
    #[arg(long, short = 'i', env = "ES_INDEX", global = true)]
    pub es_index: Option<String>,

    /// REST API port.
    #[arg(long, short = 'a', env = "API_PORT", global = true)]
    pub api_port: Option<u16>,

    /// Timeout in milliseconds for handling a message.
    #[arg(long, global = true)]
    pub handler_timeout: Option<u64>,

    /// On DELETE, remove both the file and directory documents for the path.
    #[arg(long, global = true)]
    pub delete_any_kind: bool,

    /// Requeue messages that failed because the store was unavailable.
    #[arg(long, global = true)]
    pub requeue_on_store_error: Option<bool>,
}

impl Overrides {
    /// Layer these overrides onto `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        config.dev |= self.dev;
        config.verbose |= self.verbose;

        let amqp = &mut config.amqp;
        if let Some(host) = &self.rabbit_mq_host {
            amqp.host = host.clone();
        }
        if let Some(port) = self.rabbit_mq_port {
            amqp.port = port;
        }
        if let Some(user) = &self.rabbit_mq_user {
            amqp.user = user.clone();
        }
        if let Some(password) = &self.rabbit_mq_password {
            amqp.password = password.clone();
        }
        if let Some(exchange) = &self.rabbit_mq_exchange {
            amqp.exchange = exchange.clone();
        }
        if self.rabbit_mq_queue.is_some() || self.rabbit_mq_routing_key.is_some() {
            let base = amqp.bindings.first().cloned().unwrap_or_default();
            amqp.bindings = vec![BindingConfig {
                queue: self.rabbit_mq_queue.clone().unwrap_or(base.queue),
                routing_key: self.rabbit_mq_routing_key.clone().unwrap_or(base.routing_key),
            }];
        }

        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(url) = &self.es_url {
            config.store.url = url.clone();
        }
        if let Some(index) = &self.es_index {
            config.store.index = index.clone();
        }
        if let Some(port) = self.api_port {
            config.api.port = port;
        }

        let ingest = &mut config.ingest;
        if let Some(ms) = self.handler_timeout {
            ingest.handler_timeout_ms = ms;
        }
        if self.delete_any_kind {
            ingest.delete_match = DeleteMatch::AnyKind;
        }
        if let Some(requeue) = self.requeue_on_store_error {
            ingest.retry.requeue_on_store_error = requeue;
        }
    }
}
