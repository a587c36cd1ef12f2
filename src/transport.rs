use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use lapin::message::Delivery as AmqpDelivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::config::{AmqpConfig, BindingConfig};
use crate::ingress::worker::Delivery;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("amqp: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Deliveries from one bound queue, in arrival order.
pub type AmqpDeliveries = BoxStream<'static, Result<AmqpMessage, TransportError>>;

/// RabbitMQ connection with the notification exchange declared.
pub struct AmqpTransport {
    connection: Connection,
    channel: Channel,
    prefetch: u16,
}

impl AmqpTransport {
    /// Connect, open a channel and declare the durable topic exchange.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, TransportError> {
        let connection = Connection::connect(&config.uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        tracing::info!(host = %config.host, exchange = %config.exchange, "connected to rabbitmq");
        Ok(Self {
            connection,
            channel,
            prefetch: config.prefetch,
        })
    }

    /// Declare the binding's durable queue, bind it to `exchange` and start a
    /// manual-ack consumer on it.
    pub async fn consume(
        &self,
        exchange: &str,
        binding: &BindingConfig,
    ) -> Result<AmqpDeliveries, TransportError> {
        let channel = &self.channel;
        channel
            .queue_declare(
                &binding.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &binding.queue,
                exchange,
                &binding.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;
        let consumer = channel
            .basic_consume(
                &binding.queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(consumer
            .map(|next| next.map(AmqpMessage).map_err(TransportError::from))
            .boxed())
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.connection.close(200, "shutting down").await?;
        Ok(())
    }
}

/// An AMQP delivery awaiting acknowledgement.
pub struct AmqpMessage(AmqpDelivery);

#[async_trait]
impl Delivery for AmqpMessage {
    fn payload(&self) -> &[u8] {
        &self.0.data
    }

    async fn ack(&self) -> Result<(), TransportError> {
        self.0.acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), TransportError> {
        self.0
            .acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await?;
        Ok(())
    }
}
