//! Shopping cart (spec §3, §8 scenario 6: merge semantics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::isbn::Isbn;
use super::money::Money;
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CartItemKey {
    pub isbn: Isbn,
    pub seller_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub isbn: Isbn,
    pub seller_id: String,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub customer_id: String,
    pub items: HashMap<CartItemKey, CartItem>,
    pub updated_date: DateTime<Utc>,
}

impl ShoppingCart {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items: HashMap::new(),
            updated_date: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adding an existing (ISBN, sellerId) key sums quantity; `unit_price`
    /// is refreshed to the latest add so the cart reflects current pricing.
    pub fn add_item(
        &mut self,
        isbn: Isbn,
        seller_id: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidAmount("quantity must be >= 1".into()));
        }
        let seller_id = seller_id.into();
        let key = CartItemKey {
            isbn: isbn.clone(),
            seller_id: seller_id.clone(),
        };

        self.items
            .entry(key)
            .and_modify(|existing| {
                existing.quantity += quantity;
                existing.unit_price = unit_price.clone();
            })
            .or_insert(CartItem {
                isbn,
                seller_id,
                quantity,
                unit_price,
            });

        self.updated_date = Utc::now();
        Ok(())
    }

    pub fn remove_item(&mut self, isbn: &Isbn, seller_id: &str) {
        self.items.remove(&CartItemKey {
            isbn: isbn.clone(),
            seller_id: seller_id.to_string(),
        });
        self.updated_date = Utc::now();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_date = Utc::now();
    }

    /// Groups items by sellerId, preserving nothing about ordering beyond
    /// what the HashMap happens to give — checkout session construction sorts
    /// seller groups deterministically on top of this.
    pub fn group_by_seller(&self) -> HashMap<String, Vec<&CartItem>> {
        let mut groups: HashMap<String, Vec<&CartItem>> = HashMap::new();
        for item in self.items.values() {
            groups.entry(item.seller_id.clone()).or_default().push(item);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn isbn() -> Isbn {
        Isbn::parse("9780123456789").unwrap()
    }

    #[test]
    fn adding_same_key_twice_sums_quantity() {
        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(isbn(), "s1", 1, Money::new(dec!(10), "DKK").unwrap())
            .unwrap();
        let first_updated = cart.updated_date;
        std::thread::sleep(std::time::Duration::from_millis(2));
        cart.add_item(isbn(), "s1", 2, Money::new(dec!(10), "DKK").unwrap())
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        let key = CartItemKey {
            isbn: isbn(),
            seller_id: "s1".to_string(),
        };
        assert_eq!(cart.items[&key].quantity, 3);
        assert!(cart.updated_date >= first_updated);
    }

    #[test]
    fn different_sellers_are_distinct_rows() {
        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(isbn(), "s1", 1, Money::new(dec!(10), "DKK").unwrap())
            .unwrap();
        cart.add_item(isbn(), "s2", 1, Money::new(dec!(10), "DKK").unwrap())
            .unwrap();
        assert_eq!(cart.items.len(), 2);
    }
}
