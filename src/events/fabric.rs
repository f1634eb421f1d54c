//! Event Fabric adapter (spec §4.1, C1).
//!
//! One topic exchange per domain, direct routing keys, durable queues,
//! at-least-once delivery with manual ack, poison messages routed to a
//! per-queue dead-letter queue. Grounded on the `amqp` feature (lapin +
//! deadpool-lapin) wired up in the marketplace reference platform's
//! messaging-backend feature set.

use std::time::Duration;

use futures_util::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::{error, info, warn};

use super::envelope::Envelope;
use super::routing::{Exchange, RoutingKey};

const MAX_RECONNECT_ATTEMPTS: u32 = 15;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Thin wrapper around a single AMQP connection + channel, matching §5's
/// "one channel per consumer, broker channel is per-connection mutable."
pub struct EventFabric {
    connection: Connection,
    channel: Channel,
}

impl EventFabric {
    /// Connects with exponential backoff capped at 60s, up to 15 attempts on
    /// startup (spec §4.1 publisher resilience contract).
    pub async fn connect(amqp_url: &str) -> anyhow::Result<Self> {
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(250);

        loop {
            attempt += 1;
            match Connection::connect(amqp_url, ConnectionProperties::default()).await {
                Ok(connection) => {
                    let channel = connection.create_channel().await?;
                    info!(attempt, "connected to event fabric broker");
                    return Ok(Self { connection, channel });
                }
                Err(err) if attempt < MAX_RECONNECT_ATTEMPTS => {
                    warn!(attempt, error = %err, backoff_ms = backoff.as_millis(), "broker connect failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(err) => {
                    error!(attempt, error = %err, "broker connect failed, giving up after max attempts");
                    return Err(err.into());
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// Declares the exchange, a durable queue bound to the given routing
    /// keys, and that queue's dead-letter queue. Idempotent — safe to call on
    /// every consumer startup.
    pub async fn declare_consumer_topology(
        &self,
        exchange: Exchange,
        queue_name: &str,
        routing_keys: &[RoutingKey],
    ) -> anyhow::Result<()> {
        self.channel
            .exchange_declare(
                exchange.name(),
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let dlq_name = format!("{queue_name}.dlq");
        self.channel
            .queue_declare(&dlq_name, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;

        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString("".into()),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(dlq_name.clone().into()),
        );

        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions { durable: true, ..Default::default() },
                args,
            )
            .await?;

        for key in routing_keys {
            self.channel
                .queue_bind(
                    queue_name,
                    exchange.name(),
                    key.as_str(),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        Ok(())
    }

    /// Publisher contract: persistent message with messageId/correlationId/
    /// timestamp/contentType headers (spec §4.1).
    pub async fn publish(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let exchange = envelope.routing_key.exchange();
        let body = serde_json::to_vec(&envelope.payload)?;

        let mut headers = FieldTable::default();
        headers.insert(
            "messageId".into(),
            AMQPValue::LongString(envelope.headers.message_id.to_string().into()),
        );
        headers.insert(
            "correlationId".into(),
            AMQPValue::LongString(envelope.headers.correlation_id.to_string().into()),
        );
        headers.insert(
            "timestamp".into(),
            AMQPValue::LongString(envelope.headers.timestamp.to_rfc3339().into()),
        );

        let props = BasicProperties::default()
            .with_delivery_mode(2) // persistent
            .with_content_type(envelope.headers.content_type.clone().into())
            .with_headers(headers);

        self.channel
            .basic_publish(
                exchange.name(),
                envelope.routing_key.as_str(),
                BasicPublishOptions::default(),
                &body,
                props,
            )
            .await?
            .await?;

        Ok(())
    }

    /// Starts a consumer on `queue_name` with the configured prefetch count
    /// (spec §5 backpressure). `handler` returns `Ok(())` to ack, `Err` to
    /// nack-with-requeue unless `attempts` has reached `max_attempts`, in
    /// which case the message is nacked without requeue and falls to the DLQ.
    pub async fn consume<F, Fut>(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        prefetch: u16,
        max_attempts: u32,
        handler: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(String, Vec<u8>, FieldTable) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
    {
        self.channel
            .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
            .await?;

        let mut consumer = self
            .channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(err) => {
                    error!(error = %err, "consumer stream error");
                    continue;
                }
            };

            let attempts = delivery_attempt_count(&delivery.properties) + 1;
            let routing_key = delivery.routing_key.to_string();
            let body = delivery.data.clone();
            let headers = delivery
                .properties
                .headers()
                .clone()
                .unwrap_or_default();

            match handler(routing_key, body, headers).await {
                Ok(()) => {
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(err) if attempts < max_attempts => {
                    warn!(attempts, error = %err, "handler failed, requeueing");
                    delivery
                        .nack(BasicNackOptions { requeue: true, ..Default::default() })
                        .await?;
                }
                Err(err) => {
                    error!(attempts, error = %err, "handler failed permanently, routing to DLQ");
                    delivery
                        .nack(BasicNackOptions { requeue: false, ..Default::default() })
                        .await?;
                }
            }
        }

        Ok(())
    }
}

fn delivery_attempt_count(props: &BasicProperties) -> u32 {
    // RabbitMQ's `x-death` header array length approximates retry count for
    // messages that have already round-tripped through a DLQ once; a plain
    // redelivery without x-death is attempt 0.
    props
        .headers()
        .as_ref()
        .and_then(|h| h.inner().get("x-death"))
        .and_then(|v| match v {
            AMQPValue::FieldArray(arr) => Some(arr.as_slice().len() as u32),
            _ => None,
        })
        .unwrap_or(0)
}
