//! Compensation ledger persistence + trigger orchestration (spec §4.4, C5).

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::domain::compensation::{CompensationLedger, FailureType};
use crate::error::AppError;
use crate::events::{Envelope, EventPublisher, RoutingKey};

/// Durable per-order compensation ledger (spec §9 Open Question #3, resolved
/// in SPEC_FULL.md/DESIGN.md as SQLite-backed rather than in-process — a
/// consumer restart must not forget a trigger it already fired).
pub struct CompensationOrchestrator {
    conn: Arc<Mutex<Connection>>,
    fabric: Arc<dyn EventPublisher>,
    trigger_quiet_period: Duration,
}

impl CompensationOrchestrator {
    pub fn new(db_path: &str, fabric: Arc<dyn EventPublisher>, trigger_quiet_period: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS compensation_ledgers (
                order_id TEXT PRIMARY KEY,
                triggered INTEGER NOT NULL,
                state TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fabric,
            trigger_quiet_period,
        })
    }

    async fn load(&self, order_id: Uuid) -> anyhow::Result<CompensationLedger> {
        let conn = self.conn.lock().await;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM compensation_ledgers WHERE order_id=?1",
                params![order_id.to_string()],
                |row| row.get(0),
            )
            .ok();
        match state {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(CompensationLedger::new(order_id)),
        }
    }

    /// Every ledger not yet triggered, for the periodic sweep. Small
    /// production table (one row per order with at least one recorded
    /// failure), so a full scan per tick is cheap enough not to need an
    /// extra index on `trigger_scheduled`.
    async fn load_untriggered_order_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT order_id FROM compensation_ledgers WHERE triggered=0")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect();
        Ok(ids)
    }

    async fn persist(&self, ledger: &CompensationLedger) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        let json = serde_json::to_string(ledger)?;
        conn.execute(
            "INSERT INTO compensation_ledgers (order_id, triggered, state) VALUES (?1,?2,?3)
             ON CONFLICT(order_id) DO UPDATE SET triggered=excluded.triggered, state=excluded.state",
            params![ledger.order_id.to_string(), ledger.triggered as i64, json],
        )?;
        Ok(())
    }

    /// Records a failure. Deliberately does not decide whether to emit
    /// `CompensationRequired` here — that decision is deferred to
    /// `finalize_trigger`/`finalize_due_triggers`, so a critical failure
    /// that arrives moments after the first one still lands in the single
    /// event that gets published (spec §4.4 scenario 3).
    pub async fn record_failure(
        &self,
        order_id: Uuid,
        order_item_id: Option<Uuid>,
        failure_type: FailureType,
        error_message: impl Into<String>,
        correlation_id: Uuid,
    ) -> Result<(), AppError> {
        let mut ledger = self
            .load(order_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        ledger.record_failure(order_item_id, failure_type, error_message, correlation_id);
        self.persist(&ledger)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))
    }

    /// Finalizes one order's trigger immediately, bypassing the quiet-period
    /// check. Used by the sweep once the period has elapsed, and directly by
    /// tests that already know no more failures are coming.
    pub async fn finalize_trigger(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut ledger = self
            .load(order_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;

        if let Some(critical_failures) = ledger.try_trigger() {
            let correlation_id = ledger.trigger_correlation_id.unwrap_or_else(Uuid::nil);
            let envelope = Envelope::wrap(
                RoutingKey::CompensationRequired,
                correlation_id,
                &serde_json::json!({ "orderId": order_id, "failures": critical_failures }),
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
            self.fabric
                .publish(&envelope)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        self.persist(&ledger)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))
    }

    /// Finalizes every ledger whose quiet period has elapsed since its last
    /// failure. Called on a fixed interval by the compensation-orchestrator
    /// binary's sweep loop. Returns the number of `CompensationRequired`
    /// events emitted.
    pub async fn finalize_due_triggers(&self) -> Result<usize, AppError> {
        let order_ids = self
            .load_untriggered_order_ids()
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        let now = Utc::now();
        let quiet_period = chrono::Duration::from_std(self.trigger_quiet_period).unwrap_or(chrono::Duration::zero());

        let mut fired = 0usize;
        for order_id in order_ids {
            let ledger = self
                .load(order_id)
                .await
                .map_err(|e| AppError::unexpected(e.to_string()))?;
            if !ledger.ready_to_finalize_trigger(quiet_period, now) {
                continue;
            }
            self.finalize_trigger(order_id).await?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Records completion of one item's compensating action (e.g. inventory
    /// released). Once every critical failure's item has completed,
    /// publishes `OrderCancellationRequested`. Does not publish
    /// `CompensationCompleted` itself — that event is produced by whichever
    /// service performed the compensating action and only ever consumed
    /// here (spec §4.4).
    pub async fn record_completion(
        &self,
        order_id: Uuid,
        order_item_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<(), AppError> {
        let mut ledger = self
            .load(order_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        ledger.record_completion(order_item_id);

        if ledger.try_request_cancellation() {
            let cancel_envelope = Envelope::wrap(
                RoutingKey::OrderCancellationRequested,
                correlation_id,
                &serde_json::json!({ "orderId": order_id }),
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
            self.fabric
                .publish(&cancel_envelope)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        self.persist(&ledger)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    /// Records every envelope it's handed instead of touching a broker, so
    /// the orchestrator's event sequencing can be asserted directly.
    #[derive(Default)]
    struct RecordingPublisher {
        published: SyncMutex<Vec<Envelope>>,
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, envelope: &Envelope) -> anyhow::Result<()> {
            self.published.lock().push(envelope.clone());
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn envelopes_for(&self, key: RoutingKey) -> Vec<Envelope> {
            self.published
                .lock()
                .iter()
                .filter(|e| e.routing_key == key)
                .cloned()
                .collect()
        }
    }

    fn temp_db_path(label: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "betterbooks-compensation-{label}-{}-{}.sqlite",
            std::process::id(),
            Uuid::new_v4()
        ));
        path
    }

    /// Scenario 3 (spec §8): I1 fails critically, a Notification failure is
    /// recorded alongside it, then I2 fails critically too. Finalizing the
    /// trigger once must emit a single `CompensationRequired` listing both
    /// I1 and I2 — not just I1, the one that first scheduled it. Completing
    /// both items then drives exactly one `OrderCancellationRequested`, even
    /// if a completion is (erroneously) redelivered.
    #[tokio::test]
    async fn scenario_3_emits_combined_trigger_and_exactly_one_cancellation() {
        let db_path = temp_db_path("scenario3");
        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = CompensationOrchestrator::new(
            db_path.to_str().unwrap(),
            publisher.clone() as Arc<dyn EventPublisher>,
            Duration::from_secs(5),
        )
        .unwrap();

        let order_id = Uuid::new_v4();
        let item1 = Uuid::new_v4();
        let item2 = Uuid::new_v4();

        orchestrator
            .record_failure(order_id, Some(item1), FailureType::InventoryReservation, "boom", Uuid::new_v4())
            .await
            .unwrap();
        orchestrator
            .record_failure(order_id, None, FailureType::Notification, "email down", Uuid::new_v4())
            .await
            .unwrap();
        orchestrator
            .record_failure(order_id, Some(item2), FailureType::InventoryReservation, "boom2", Uuid::new_v4())
            .await
            .unwrap();

        // Nothing emitted yet: finalization is deferred until the quiet
        // period elapses, which in production happens on the sweep tick.
        assert!(publisher.envelopes_for(RoutingKey::CompensationRequired).is_empty());

        orchestrator.finalize_trigger(order_id).await.unwrap();

        let required = orchestrator_required_failures(&publisher);
        assert_eq!(required.len(), 1, "exactly one CompensationRequired");
        let failures = required[0]["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 2, "both I1 and I2 must be listed");

        // A second finalize call for the same order (e.g. a redundant sweep
        // tick) must not emit a second CompensationRequired.
        orchestrator.finalize_trigger(order_id).await.unwrap();
        assert_eq!(orchestrator_required_failures(&publisher).len(), 1);

        orchestrator.record_completion(order_id, item1, Uuid::new_v4()).await.unwrap();
        assert!(publisher.envelopes_for(RoutingKey::OrderCancellationRequested).is_empty());

        orchestrator.record_completion(order_id, item2, Uuid::new_v4()).await.unwrap();
        let cancellations = publisher.envelopes_for(RoutingKey::OrderCancellationRequested);
        assert_eq!(cancellations.len(), 1, "exactly one OrderCancellationRequested");

        // A duplicate completion delivery for an already-completed item
        // (at-least-once redelivery) must not fire a second cancellation.
        orchestrator.record_completion(order_id, item2, Uuid::new_v4()).await.unwrap();
        assert_eq!(publisher.envelopes_for(RoutingKey::OrderCancellationRequested).len(), 1);

        let _ = std::fs::remove_file(&db_path);
    }

    /// Notification-only failures never have critical entries, so
    /// completing them must never request a cancellation (the vacuous-truth
    /// case: `all()` over zero critical entries is trivially true, but
    /// `triggered` guards against it ever mattering).
    #[tokio::test]
    async fn notification_only_failure_never_requests_cancellation() {
        let db_path = temp_db_path("notif-only");
        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = CompensationOrchestrator::new(
            db_path.to_str().unwrap(),
            publisher.clone() as Arc<dyn EventPublisher>,
            Duration::from_secs(5),
        )
        .unwrap();

        let order_id = Uuid::new_v4();
        orchestrator
            .record_failure(order_id, None, FailureType::Notification, "email down", Uuid::new_v4())
            .await
            .unwrap();

        orchestrator.finalize_trigger(order_id).await.unwrap();
        assert!(publisher.envelopes_for(RoutingKey::CompensationRequired).is_empty());
        assert!(publisher.envelopes_for(RoutingKey::OrderCancellationRequested).is_empty());

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn finalize_due_triggers_only_fires_after_the_quiet_period() {
        let db_path = temp_db_path("sweep");
        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = CompensationOrchestrator::new(
            db_path.to_str().unwrap(),
            publisher.clone() as Arc<dyn EventPublisher>,
            Duration::from_secs(3600),
        )
        .unwrap();

        let order_id = Uuid::new_v4();
        orchestrator
            .record_failure(order_id, Some(Uuid::new_v4()), FailureType::SellerStatsUpdate, "boom", Uuid::new_v4())
            .await
            .unwrap();

        let fired = orchestrator.finalize_due_triggers().await.unwrap();
        assert_eq!(fired, 0, "quiet period has not elapsed yet");
        assert!(publisher.envelopes_for(RoutingKey::CompensationRequired).is_empty());

        let _ = std::fs::remove_file(&db_path);
    }

    fn orchestrator_required_failures(publisher: &RecordingPublisher) -> Vec<serde_json::Value> {
        publisher
            .envelopes_for(RoutingKey::CompensationRequired)
            .into_iter()
            .map(|e| e.payload)
            .collect()
    }
}
