//! Payment settlement & allocation persistence (spec §4.3/§4.4, C4).
//!
//! The payment gateway itself is out of scope (spec Non-goals) — this is a
//! deterministic mock settlement that always succeeds for non-zero totals,
//! giving the rest of the pipeline (allocation persistence, fee/payout
//! bookkeeping, settlement rollups) something real to exercise.

use std::sync::Arc;
use uuid::Uuid;

use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::domain::order::{platform_fee_and_payout, Order};
use crate::domain::payment::{PaymentAllocation, SellerSettlement};
use crate::domain::CheckoutSession;
use crate::error::AppError;
use crate::events::{Envelope, EventFabric, RoutingKey};

pub struct PaymentService {
    conn: Arc<Mutex<Connection>>,
    fabric: Arc<EventFabric>,
    platform_fee_pct: rust_decimal::Decimal,
}

impl PaymentService {
    pub fn new(
        db_path: &str,
        fabric: Arc<EventFabric>,
        platform_fee_pct: rust_decimal::Decimal,
    ) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS payment_allocations (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                order_item_id TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                gross_amount TEXT NOT NULL,
                platform_fee TEXT NOT NULL,
                net_payout TEXT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS seller_settlements (
                settlement_id TEXT PRIMARY KEY,
                seller_id TEXT NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                total_payout TEXT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fabric,
            platform_fee_pct,
        })
    }

    /// Builds one PaymentAllocation per OrderItem (spec §4.3 step 2: "Persist
    /// PaymentAllocation rows per item"), each item's fee/payout split from
    /// its own subtotal using the same banker's-rounded fee fraction the
    /// session used for its per-seller totals. Marks them Paid (mock gateway
    /// always succeeds here) and persists them.
    pub async fn settle_order(
        &self,
        order: &Order,
        session: &CheckoutSession,
        correlation_id: Uuid,
    ) -> Result<Vec<PaymentAllocation>, AppError> {
        let _ = session;
        let mut allocations = Vec::new();

        for item in &order.order_items {
            let gross = item.subtotal();
            let (fee, payout) = platform_fee_and_payout(&gross, self.platform_fee_pct);
            let mut allocation = PaymentAllocation::new(
                order.id,
                item.id,
                item.seller_id.clone(),
                gross,
                fee,
                payout,
            );
            allocation.mark_paid();
            allocations.push(allocation);
        }

        let conn = self.conn.lock().await;
        for alloc in &allocations {
            conn.execute(
                "INSERT INTO payment_allocations
                    (id, order_id, order_item_id, seller_id, gross_amount, platform_fee, net_payout, currency, status, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    alloc.id.to_string(),
                    alloc.order_id.to_string(),
                    alloc.order_item_id.to_string(),
                    alloc.seller_id,
                    alloc.gross_amount.amount.to_string(),
                    alloc.platform_fee.amount.to_string(),
                    alloc.net_payout.amount.to_string(),
                    alloc.net_payout.currency,
                    format!("{:?}", alloc.status),
                    alloc.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        }
        drop(conn);

        for alloc in &allocations {
            let envelope = Envelope::wrap(
                RoutingKey::OrderItemStatusChanged,
                correlation_id,
                &serde_json::json!({
                    "orderId": alloc.order_id,
                    "sellerId": alloc.seller_id,
                    "netPayout": alloc.net_payout,
                }),
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
            self.fabric
                .publish(&envelope)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        Ok(allocations)
    }

    /// §4.4 Settlement: rolls up Paid allocations for `seller_id` in
    /// [period_start, period_end) into one SellerSettlement row.
    pub async fn roll_up_settlement(
        &self,
        seller_id: &str,
        period_start: chrono::DateTime<chrono::Utc>,
        period_end: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<SellerSettlement>, AppError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, order_id, order_item_id, seller_id, gross_amount, platform_fee, net_payout, currency, status, created_at
                 FROM payment_allocations
                 WHERE seller_id=?1 AND status='Paid' AND created_at >= ?2 AND created_at < ?3",
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![seller_id, period_start.to_rfc3339(), period_end.to_rfc3339()],
                |row| {
                    Ok(PaymentAllocation {
                        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap(),
                        order_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap(),
                        order_item_id: Uuid::parse_str(&row.get::<_, String>(2)?).unwrap(),
                        seller_id: row.get(3)?,
                        gross_amount: crate::domain::Money::new(
                            row.get::<_, String>(4)?.parse().unwrap(),
                            row.get::<_, String>(7)?,
                        )
                        .unwrap(),
                        platform_fee: crate::domain::Money::new(
                            row.get::<_, String>(5)?.parse().unwrap(),
                            row.get::<_, String>(7)?,
                        )
                        .unwrap(),
                        net_payout: crate::domain::Money::new(
                            row.get::<_, String>(6)?.parse().unwrap(),
                            row.get::<_, String>(7)?,
                        )
                        .unwrap(),
                        status: crate::domain::payment::PaymentAllocationStatus::Paid,
                        created_at: row.get::<_, String>(9)?.parse().unwrap(),
                    })
                },
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        drop(stmt);
        drop(conn);

        let settlement = SellerSettlement::roll_up(seller_id, period_start, period_end, &rows);

        if let Some(ref s) = settlement {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO seller_settlements
                    (settlement_id, seller_id, period_start, period_end, total_payout, currency, status)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    s.settlement_id.to_string(),
                    s.seller_id,
                    s.period_start.to_rfc3339(),
                    s.period_end.to_rfc3339(),
                    s.total_payout.amount.to_string(),
                    s.total_payout.currency,
                    format!("{:?}", s.status),
                ],
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        }

        Ok(settlement)
    }

    pub async fn distinct_seller_ids(&self) -> Result<Vec<String>, AppError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT DISTINCT seller_id FROM payment_allocations WHERE status='Paid'")
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::unexpected(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        Ok(rows)
    }
}
