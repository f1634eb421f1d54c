//! Durable Order storage with optimistic concurrency (spec §5: "Order
//! aggregates are single-writer per orderId via optimistic concurrency on a
//! version column; conflicting updates fail with ConcurrencyConflict").
//!
//! Grounded on the teacher's `Arc<Mutex<Connection>>` + rusqlite idiom from
//! `vault::user_accounts::UserAccountsDB`.

use rusqlite::{params, Connection};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::order::{Order, OrderItem, OrderItemStatus, OrderStatus};
use crate::domain::{Address, Isbn, Money};
use crate::error::DomainError;

pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                order_date TEXT NOT NULL,
                total_amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                street TEXT NOT NULL,
                city TEXT NOT NULL,
                postal_code TEXT NOT NULL,
                state TEXT,
                country TEXT NOT NULL,
                version INTEGER NOT NULL,
                paid_date TEXT,
                shipped_date TEXT,
                delivered_date TEXT,
                cancelled_date TEXT,
                refunded_date TEXT,
                cancellation_reason TEXT,
                refund_reason TEXT
            );
            CREATE TABLE IF NOT EXISTS order_items (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                isbn TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price TEXT NOT NULL,
                currency TEXT NOT NULL,
                item_status TEXT NOT NULL,
                FOREIGN KEY(order_id) REFERENCES orders(id)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn insert(&self, order: &Order) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO orders (id, customer_id, order_date, total_amount, currency, status,
                street, city, postal_code, state, country, version,
                paid_date, shipped_date, delivered_date, cancelled_date, refunded_date,
                cancellation_reason, refund_reason)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                order.id.to_string(),
                order.customer_id,
                order.order_date.to_rfc3339(),
                order.total_amount.amount.to_string(),
                order.total_amount.currency,
                format!("{:?}", order.status),
                order.delivery_address.street,
                order.delivery_address.city,
                order.delivery_address.postal_code,
                order.delivery_address.state,
                order.delivery_address.country,
                order.version,
                order.paid_date.map(|d| d.to_rfc3339()),
                order.shipped_date.map(|d| d.to_rfc3339()),
                order.delivered_date.map(|d| d.to_rfc3339()),
                order.cancelled_date.map(|d| d.to_rfc3339()),
                order.refunded_date.map(|d| d.to_rfc3339()),
                order.cancellation_reason,
                order.refund_reason,
            ],
        )?;

        for item in &order.order_items {
            conn.execute(
                "INSERT INTO order_items (id, order_id, isbn, seller_id, quantity, unit_price, currency, item_status)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    item.id.to_string(),
                    order.id.to_string(),
                    item.isbn.as_str(),
                    item.seller_id,
                    item.quantity,
                    item.unit_price.amount.to_string(),
                    item.unit_price.currency,
                    format!("{:?}", item.item_status),
                ],
            )?;
        }
        Ok(())
    }

    /// Persists `order`'s mutated fields iff the stored version still
    /// matches `expected_version`; bumps the stored version by one.
    /// Fails with `ConcurrencyConflict` on mismatch (spec §5).
    pub async fn update_with_version_check(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute(
                "UPDATE orders SET status=?1, version=?2, paid_date=?3, shipped_date=?4,
                    delivered_date=?5, cancelled_date=?6, refunded_date=?7,
                    cancellation_reason=?8, refund_reason=?9
                 WHERE id=?10 AND version=?11",
                params![
                    format!("{:?}", order.status),
                    order.version,
                    order.paid_date.map(|d| d.to_rfc3339()),
                    order.shipped_date.map(|d| d.to_rfc3339()),
                    order.delivered_date.map(|d| d.to_rfc3339()),
                    order.cancelled_date.map(|d| d.to_rfc3339()),
                    order.refunded_date.map(|d| d.to_rfc3339()),
                    order.cancellation_reason,
                    order.refund_reason,
                    order.id.to_string(),
                    expected_version,
                ],
            )
            .map_err(|e| DomainError::ConcurrencyConflict(e.to_string()))?;

        if rows == 0 {
            return Err(DomainError::ConcurrencyConflict(order.id.to_string()));
        }

        for item in &order.order_items {
            conn.execute(
                "UPDATE order_items SET item_status=?1 WHERE id=?2",
                params![format!("{:?}", item.item_status), item.id.to_string()],
            )
            .map_err(|e| DomainError::ConcurrencyConflict(e.to_string()))?;
        }

        Ok(())
    }

    pub async fn load(&self, order_id: Uuid) -> anyhow::Result<Option<Order>> {
        let conn = self.conn.lock().await;
        let order_row = conn.query_row(
            "SELECT customer_id, order_date, total_amount, currency, status,
                street, city, postal_code, state, country, version,
                paid_date, shipped_date, delivered_date, cancelled_date, refunded_date,
                cancellation_reason, refund_reason
             FROM orders WHERE id=?1",
            params![order_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, Option<String>>(11)?,
                    row.get::<_, Option<String>>(12)?,
                    row.get::<_, Option<String>>(13)?,
                    row.get::<_, Option<String>>(14)?,
                    row.get::<_, Option<String>>(15)?,
                    row.get::<_, Option<String>>(16)?,
                    row.get::<_, Option<String>>(17)?,
                ))
            },
        );

        let (
            customer_id,
            order_date,
            total_amount,
            currency,
            status,
            street,
            city,
            postal_code,
            state,
            country,
            version,
            paid_date,
            shipped_date,
            delivered_date,
            cancelled_date,
            refunded_date,
            cancellation_reason,
            refund_reason,
        ) = match order_row {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut stmt = conn.prepare(
            "SELECT id, isbn, seller_id, quantity, unit_price, currency, item_status
             FROM order_items WHERE order_id=?1",
        )?;
        let items = stmt
            .query_map(params![order_id.to_string()], |row| {
                Ok(OrderItem {
                    id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap(),
                    isbn: Isbn::parse(&row.get::<_, String>(1)?).unwrap(),
                    seller_id: row.get(2)?,
                    quantity: row.get::<_, i64>(3)? as u32,
                    unit_price: Money::new(
                        row.get::<_, String>(4)?.parse().unwrap(),
                        row.get::<_, String>(5)?,
                    )
                    .unwrap(),
                    item_status: parse_item_status(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Order {
            id: order_id,
            customer_id,
            order_date: order_date.parse().unwrap(),
            total_amount: Money::new(total_amount.parse().unwrap(), currency).unwrap(),
            status: parse_status(&status),
            delivery_address: Address {
                street,
                city,
                postal_code,
                state,
                country,
            },
            order_items: items,
            version,
            paid_date: paid_date.map(|d| d.parse().unwrap()),
            shipped_date: shipped_date.map(|d| d.parse().unwrap()),
            delivered_date: delivered_date.map(|d| d.parse().unwrap()),
            cancelled_date: cancelled_date.map(|d| d.parse().unwrap()),
            refunded_date: refunded_date.map(|d| d.parse().unwrap()),
            cancellation_reason,
            refund_reason,
        }))
    }
}

fn parse_status(s: &str) -> OrderStatus {
    match s {
        "Pending" => OrderStatus::Pending,
        "Paid" => OrderStatus::Paid,
        "Shipped" => OrderStatus::Shipped,
        "Delivered" => OrderStatus::Delivered,
        "Completed" => OrderStatus::Completed,
        "Cancelled" => OrderStatus::Cancelled,
        "Refunded" => OrderStatus::Refunded,
        other => panic!("unknown order status in storage: {other}"),
    }
}

fn parse_item_status(s: &str) -> OrderItemStatus {
    match s {
        "Pending" => OrderItemStatus::Pending,
        "Reserved" => OrderItemStatus::Reserved,
        "Shipped" => OrderItemStatus::Shipped,
        "Cancelled" => OrderItemStatus::Cancelled,
        "Refunded" => OrderItemStatus::Refunded,
        other => panic!("unknown order item status in storage: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderItem as Item;
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    async fn repo() -> (OrderRepository, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let repo = OrderRepository::new(temp.path().to_str().unwrap()).unwrap();
        (repo, temp)
    }

    fn sample_order() -> Order {
        let addr = Address::new("Main St 1", "Aarhus", "8000", None, None).unwrap();
        let item = Item::new(
            Isbn::parse("9780123456789").unwrap(),
            "s1",
            1,
            Money::new(dec!(29.99), "DKK").unwrap(),
        )
        .unwrap();
        Order::new("cust-1", addr, vec![item]).unwrap()
    }

    #[tokio::test]
    async fn insert_then_load_round_trips() {
        let (repo, _tmp) = repo().await;
        let order = sample_order();
        repo.insert(&order).await.unwrap();

        let loaded = repo.load(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, order.id);
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.total_amount, order.total_amount);
        assert_eq!(loaded.order_items.len(), 1);
    }

    #[tokio::test]
    async fn version_mismatch_is_rejected() {
        let (repo, _tmp) = repo().await;
        let mut order = sample_order();
        repo.insert(&order).await.unwrap();

        order.process_payment(&order.total_amount.clone()).unwrap();
        // Wrong expected_version (order is at 0 in storage, order.version is
        // now 1 post-transition; simulate a stale caller passing 5).
        let result = repo.update_with_version_check(&order, 5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn correct_version_commits_and_bumps() {
        let (repo, _tmp) = repo().await;
        let mut order = sample_order();
        repo.insert(&order).await.unwrap();

        let stale_version = order.version;
        order.process_payment(&order.total_amount.clone()).unwrap();
        repo.update_with_version_check(&order, stale_version).await.unwrap();

        let loaded = repo.load(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Paid);
        assert_eq!(loaded.version, 1);
    }
}
