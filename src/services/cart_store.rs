//! Durable shopping cart storage (spec §4.3: the cart survives across
//! sessions, unlike the ephemeral CheckoutSession it seeds).

use rusqlite::{params, Connection};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::cart::CartItem;
use crate::domain::{Isbn, Money, ShoppingCart};

pub struct CartStore {
    conn: Arc<Mutex<Connection>>,
}

impl CartStore {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cart_items (
                customer_id TEXT NOT NULL,
                isbn TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price TEXT NOT NULL,
                currency TEXT NOT NULL,
                PRIMARY KEY (customer_id, isbn, seller_id)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn load(&self, customer_id: &str) -> anyhow::Result<ShoppingCart> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT isbn, seller_id, quantity, unit_price, currency
             FROM cart_items WHERE customer_id=?1",
        )?;
        let mut cart = ShoppingCart::new(customer_id);
        let rows = stmt.query_map(params![customer_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? as u32,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        for row in rows {
            let (isbn, seller_id, quantity, unit_price, currency) = row?;
            cart.items.insert(
                crate::domain::cart::CartItemKey {
                    isbn: Isbn::parse(&isbn).expect("stored isbn is always valid"),
                    seller_id: seller_id.clone(),
                },
                CartItem {
                    isbn: Isbn::parse(&isbn).expect("stored isbn is always valid"),
                    seller_id,
                    quantity,
                    unit_price: Money::new(unit_price.parse().unwrap(), currency).unwrap(),
                },
            );
        }
        Ok(cart)
    }

    /// Full-cart upsert — simplest correct strategy for a value object this
    /// small; replaces every row for the customer on each save.
    pub async fn save(&self, cart: &ShoppingCart) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM cart_items WHERE customer_id=?1",
            params![cart.customer_id],
        )?;
        for item in cart.items.values() {
            conn.execute(
                "INSERT INTO cart_items (customer_id, isbn, seller_id, quantity, unit_price, currency)
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    cart.customer_id,
                    item.isbn.as_str(),
                    item.seller_id,
                    item.quantity,
                    item.unit_price.amount.to_string(),
                    item.unit_price.currency,
                ],
            )?;
        }
        Ok(())
    }

    pub async fn clear(&self, customer_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM cart_items WHERE customer_id=?1",
            params![customer_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let temp = NamedTempFile::new().unwrap();
        let store = CartStore::new(temp.path().to_str().unwrap()).unwrap();

        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(
            Isbn::parse("9780123456789").unwrap(),
            "s1",
            2,
            Money::new(dec!(29.99), "DKK").unwrap(),
        )
        .unwrap();
        store.save(&cart).await.unwrap();

        let loaded = store.load("cust-1").await.unwrap();
        assert_eq!(loaded.items.len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_cart() {
        let temp = NamedTempFile::new().unwrap();
        let store = CartStore::new(temp.path().to_str().unwrap()).unwrap();
        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(
            Isbn::parse("9780123456789").unwrap(),
            "s1",
            1,
            Money::new(dec!(10), "DKK").unwrap(),
        )
        .unwrap();
        store.save(&cart).await.unwrap();
        store.clear("cust-1").await.unwrap();
        let loaded = store.load("cust-1").await.unwrap();
        assert!(loaded.is_empty());
    }
}
