//! Compensation Orchestrator Service
//!
//! Consumes the critical failure-routing-keys (spec §4.4), drives the
//! durable compensation ledger, and periodically sweeps ledgers whose quiet
//! period has elapsed to finalize and emit `CompensationRequired`. There is
//! no separate inventory/seller-stats service in this system to perform the
//! actual rollback, so it is modeled here as an immediate, always-succeeding
//! no-op that publishes `CompensationCompleted` back onto the fabric — the
//! orchestrator itself only ever *consumes* that event to drive
//! `OrderCancellationRequested`, never produces it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};
use uuid::Uuid;

use betterbooks_backend::config::Settings;
use betterbooks_backend::domain::compensation::FailureType;
use betterbooks_backend::events::{Envelope, EventFabric, EventPublisher, Exchange, RoutingKey};
use betterbooks_backend::services::CompensationOrchestrator;
use betterbooks_backend::telemetry;

const FAILURE_QUEUE: &str = "compensation_orchestrator.failures";
const NOTIFICATION_QUEUE: &str = "compensation_orchestrator.notification_failures";
const COMPLETION_QUEUE: &str = "compensation_orchestrator.completions";

#[derive(Parser, Debug)]
#[command(name = "compensation-orchestrator")]
#[command(about = "Drives the compensation ledger from inventory/stats/notification failures")]
struct Args {}

#[derive(serde::Deserialize)]
struct FailurePayload {
    order_id: Uuid,
    order_item_id: Option<Uuid>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    correlation_id: Option<Uuid>,
}

#[derive(serde::Deserialize)]
struct CompletionPayload {
    order_id: Uuid,
    order_item_id: Uuid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("compensation-orchestrator");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }
    let _args = Args::parse();

    let settings = Settings::load();
    let fabric = Arc::new(EventFabric::connect(&settings.broker_url()).await?);
    let orchestrator = Arc::new(CompensationOrchestrator::new(
        &settings.db_conn,
        fabric.clone() as Arc<dyn EventPublisher>,
        settings.compensation_trigger_quiet_period(),
    )?);

    fabric
        .declare_consumer_topology(
            Exchange::WarehouseEvents,
            FAILURE_QUEUE,
            &[RoutingKey::InventoryReservationFailed, RoutingKey::SellerStatsUpdateFailed],
        )
        .await?;
    fabric
        .declare_consumer_topology(
            Exchange::UserEvents,
            NOTIFICATION_QUEUE,
            &[RoutingKey::NotificationFailed],
        )
        .await?;
    fabric
        .declare_consumer_topology(
            Exchange::CompensationEvents,
            COMPLETION_QUEUE,
            &[RoutingKey::CompensationCompleted],
        )
        .await?;

    let prefetch = settings.consumer_prefetch;

    let failure_orchestrator = orchestrator.clone();
    let failure_fabric = fabric.clone();
    let failure_consumer = tokio::spawn({
        let fabric = fabric.clone();
        async move {
            fabric
                .consume(FAILURE_QUEUE, "compensation-orchestrator", prefetch, 5, move |routing_key, body, _headers| {
                    let orchestrator = failure_orchestrator.clone();
                    let fabric = failure_fabric.clone();
                    async move { handle_failure(&orchestrator, &fabric, &routing_key, &body).await }
                })
                .await
        }
    });

    let notify_orchestrator = orchestrator.clone();
    let notify_fabric = fabric.clone();
    let notification_consumer = tokio::spawn({
        let fabric = fabric.clone();
        async move {
            fabric
                .consume(
                    NOTIFICATION_QUEUE,
                    "compensation-orchestrator-notify",
                    prefetch,
                    5,
                    move |routing_key, body, _headers| {
                        let orchestrator = notify_orchestrator.clone();
                        let fabric = notify_fabric.clone();
                        async move { handle_failure(&orchestrator, &fabric, &routing_key, &body).await }
                    },
                )
                .await
        }
    });

    let completion_orchestrator = orchestrator.clone();
    let completion_consumer = tokio::spawn({
        let fabric = fabric.clone();
        async move {
            fabric
                .consume(
                    COMPLETION_QUEUE,
                    "compensation-orchestrator-completion",
                    prefetch,
                    5,
                    move |_routing_key, body, _headers| {
                        let orchestrator = completion_orchestrator.clone();
                        async move { handle_completion(&orchestrator, &body).await }
                    },
                )
                .await
        }
    });

    let sweep_orchestrator = orchestrator.clone();
    let sweep_interval = settings.compensation_trigger_quiet_period().max(Duration::from_secs(1));
    let sweep_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweep_orchestrator.finalize_due_triggers().await {
                Ok(fired) if fired > 0 => tracing::info!(fired, "compensation trigger sweep finalized ledgers"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "compensation trigger sweep failed"),
            }
        }
    });

    let (a, b, c) = tokio::try_join!(failure_consumer, notification_consumer, completion_consumer)?;
    a?;
    b?;
    c?;
    sweep_task.abort();
    Ok(())
}

async fn handle_failure(
    orchestrator: &CompensationOrchestrator,
    fabric: &EventFabric,
    routing_key: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    let failure_type = match routing_key {
        "InventoryReservationFailed" => FailureType::InventoryReservation,
        "SellerStatsUpdateFailed" => FailureType::SellerStatsUpdate,
        "NotificationFailed" => FailureType::Notification,
        other => {
            warn!(routing_key = other, "unhandled routing key on compensation queue");
            return Ok(());
        }
    };

    let payload: FailurePayload = serde_json::from_slice(body)?;
    let correlation_id = payload.correlation_id.unwrap_or_else(Uuid::nil);

    orchestrator
        .record_failure(
            payload.order_id,
            payload.order_item_id,
            failure_type,
            payload.error.unwrap_or_else(|| "unspecified failure".to_string()),
            correlation_id,
        )
        .await?;

    // No separate inventory/seller-stats rollback service exists in this
    // system; the compensating action is modeled as an immediate no-op that
    // publishes `CompensationCompleted` for this process's own completion
    // consumer to pick up, rather than updating the ledger directly here.
    if failure_type.is_critical() {
        if let Some(item_id) = payload.order_item_id {
            let envelope = Envelope::wrap(
                RoutingKey::CompensationCompleted,
                correlation_id,
                &serde_json::json!({ "orderId": payload.order_id, "orderItemId": item_id }),
            )?;
            fabric.publish(&envelope).await?;
        }
    }

    Ok(())
}

async fn handle_completion(orchestrator: &CompensationOrchestrator, body: &[u8]) -> anyhow::Result<()> {
    let payload: CompletionPayload = serde_json::from_slice(body)?;
    orchestrator
        .record_completion(payload.order_id, payload.order_item_id, Uuid::nil())
        .await?;
    Ok(())
}
