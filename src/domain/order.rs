//! Order aggregate & state machine (spec §3, §4.2).
//! Grounded on the `OrderStatus::can_transition_to` table pattern from the
//! marketplace reference implementation, specialized to the exact transition
//! set spec §4.2 allows (no `Processing`/`OnHold`, no `Completed -> Refunded`
//! relaxation — Delivered is the only state a refund can branch from besides
//! Paid).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use crate::domain::address::Address;
use crate::domain::isbn::Isbn;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded | OrderStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum OrderItemStatus {
    Pending,
    Reserved,
    Shipped,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub isbn: Isbn,
    pub seller_id: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub item_status: OrderItemStatus,
}

impl OrderItem {
    pub fn new(
        isbn: Isbn,
        seller_id: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidAmount("quantity must be >= 1".into()));
        }
        if unit_price.is_zero() {
            return Err(DomainError::InvalidAmount("unit_price must be > 0".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            isbn,
            seller_id: seller_id.into(),
            quantity,
            unit_price,
            item_status: OrderItemStatus::Pending,
        })
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Domain event emitted by an aggregate transition. The caller publishes
/// these to the event fabric AFTER the persistence commit (spec §4.2's
/// outbox/post-commit requirement) — the aggregate itself never talks to the
/// broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderDomainEvent {
    OrderCreated { order_id: Uuid },
    OrderPaid { order_id: Uuid, amount: Money },
    OrderShipped { order_id: Uuid },
    OrderDelivered { order_id: Uuid },
    OrderCompleted { order_id: Uuid },
    OrderCancelled { order_id: Uuid, reason: String },
    OrderRefunded { order_id: Uuid, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub delivery_address: Address,
    pub order_items: Vec<OrderItem>,
    pub version: i64,

    pub paid_date: Option<DateTime<Utc>>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub cancelled_date: Option<DateTime<Utc>>,
    pub refunded_date: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,
    pub refund_reason: Option<String>,
}

impl Order {
    pub fn new(
        customer_id: impl Into<String>,
        delivery_address: Address,
        order_items: Vec<OrderItem>,
    ) -> Result<Self, DomainError> {
        if order_items.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let currency = order_items[0].unit_price.currency.clone();
        let mut total = Money::zero(currency.clone());
        for item in &order_items {
            if item.unit_price.currency != currency {
                return Err(DomainError::CurrencyMismatch(
                    currency,
                    item.unit_price.currency.clone(),
                ));
            }
            total = total.checked_add(&item.subtotal())?;
        }

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.into(),
            order_date: Utc::now(),
            total_amount: total,
            status: OrderStatus::Pending,
            delivery_address,
            order_items,
            version: 0,
            paid_date: None,
            shipped_date: None,
            delivered_date: None,
            cancelled_date: None,
            refunded_date: None,
            cancellation_reason: None,
            refund_reason: None,
        })
    }

    /// ∀ Order o: o.totalAmount == Σ items[i].quantity * items[i].unitPrice
    pub fn recompute_total(&self) -> Result<Money, DomainError> {
        let currency = self.total_amount.currency.clone();
        let mut total = Money::zero(currency);
        for item in &self.order_items {
            total = total.checked_add(&item.subtotal())?;
        }
        Ok(total)
    }

    pub fn can_be_modified(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Distinct sellerIds across items, order preserved by first appearance.
    pub fn seller_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in &self.order_items {
            if seen.insert(item.seller_id.clone()) {
                out.push(item.seller_id.clone());
            }
        }
        out
    }

    fn require_status(&self, expected: OrderStatus) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::IllegalTransition(format!(
                "expected status {expected:?}, found {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// Pending -> Paid. `amount` MUST equal totalAmount exactly (decimal
    /// comparison, never float).
    pub fn process_payment(&mut self, amount: &Money) -> Result<OrderDomainEvent, DomainError> {
        self.require_status(OrderStatus::Pending)?;
        if amount != &self.total_amount {
            return Err(DomainError::PaymentDeclined(format!(
                "amount {} does not equal order total {}",
                amount.amount, self.total_amount.amount
            )));
        }
        self.status = OrderStatus::Paid;
        self.paid_date = Some(Utc::now());
        for item in &mut self.order_items {
            item.item_status = OrderItemStatus::Reserved;
        }
        self.version += 1;
        Ok(OrderDomainEvent::OrderPaid {
            order_id: self.id,
            amount: amount.clone(),
        })
    }

    /// Paid -> Shipped.
    pub fn mark_as_shipped(&mut self) -> Result<OrderDomainEvent, DomainError> {
        self.require_status(OrderStatus::Paid)?;
        self.status = OrderStatus::Shipped;
        self.shipped_date = Some(Utc::now());
        for item in &mut self.order_items {
            item.item_status = OrderItemStatus::Shipped;
        }
        self.version += 1;
        Ok(OrderDomainEvent::OrderShipped { order_id: self.id })
    }

    /// Shipped -> Delivered.
    pub fn mark_as_delivered(&mut self) -> Result<OrderDomainEvent, DomainError> {
        self.require_status(OrderStatus::Shipped)?;
        self.status = OrderStatus::Delivered;
        self.delivered_date = Some(Utc::now());
        self.version += 1;
        Ok(OrderDomainEvent::OrderDelivered { order_id: self.id })
    }

    /// Delivered -> Completed.
    pub fn complete(&mut self) -> Result<OrderDomainEvent, DomainError> {
        self.require_status(OrderStatus::Delivered)?;
        self.status = OrderStatus::Completed;
        self.version += 1;
        Ok(OrderDomainEvent::OrderCompleted { order_id: self.id })
    }

    /// Pending -> Cancelled, or Paid -> Cancelled (triggers refund on any
    /// captured funds — the caller is responsible for issuing that refund
    /// via PaymentService; the aggregate only records the cancellation).
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<OrderDomainEvent, DomainError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Paid => {}
            _ => {
                return Err(DomainError::IllegalTransition(format!(
                    "cannot cancel order in status {:?}",
                    self.status
                )))
            }
        }
        let reason = reason.into();
        self.status = OrderStatus::Cancelled;
        self.cancelled_date = Some(Utc::now());
        self.cancellation_reason = Some(reason.clone());
        for item in &mut self.order_items {
            item.item_status = OrderItemStatus::Cancelled;
        }
        self.version += 1;
        Ok(OrderDomainEvent::OrderCancelled {
            order_id: self.id,
            reason,
        })
    }

    /// Paid -> Refunded, or Delivered -> Refunded within the configured
    /// refund window (spec §9 Open Question #2 — resolved in SPEC_FULL.md
    /// and DESIGN.md as a configurable `refund_window_days`, default 14).
    pub fn process_refund(
        &mut self,
        reason: impl Into<String>,
        refund_window_days: i64,
    ) -> Result<OrderDomainEvent, DomainError> {
        match self.status {
            OrderStatus::Paid => {}
            OrderStatus::Delivered => {
                let delivered = self.delivered_date.ok_or_else(|| {
                    DomainError::IllegalTransition("delivered order missing deliveredDate".into())
                })?;
                let deadline = delivered + chrono::Duration::days(refund_window_days);
                if Utc::now() > deadline {
                    return Err(DomainError::IllegalTransition(
                        "refund window has elapsed".into(),
                    ));
                }
            }
            _ => {
                return Err(DomainError::IllegalTransition(format!(
                    "cannot refund order in status {:?}",
                    self.status
                )))
            }
        }
        let reason = reason.into();
        self.status = OrderStatus::Refunded;
        self.refunded_date = Some(Utc::now());
        self.refund_reason = Some(reason.clone());
        for item in &mut self.order_items {
            item.item_status = OrderItemStatus::Refunded;
        }
        self.version += 1;
        Ok(OrderDomainEvent::OrderRefunded {
            order_id: self.id,
            reason,
        })
    }
}

pub fn platform_fee_and_payout(subtotal: &Money, fee_fraction: Decimal) -> (Money, Money) {
    let fee = subtotal.multiply_fraction_banker_rounded(fee_fraction);
    let payout = subtotal
        .checked_subtract(&fee)
        .expect("fee is always <= subtotal for fee_fraction in [0,1]");
    (fee, payout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn addr() -> Address {
        Address::new("Main St 1", "Aarhus", "8000", None, None).unwrap()
    }

    fn item(seller: &str, qty: u32, price: Decimal) -> OrderItem {
        OrderItem::new(
            Isbn::parse("9780123456789").unwrap(),
            seller,
            qty,
            Money::new(price, "DKK").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn total_equals_sum_of_item_subtotals() {
        let order = Order::new(
            "cust-1",
            addr(),
            vec![item("s1", 2, dec!(29.99)), item("s2", 1, dec!(39.99))],
        )
        .unwrap();
        assert_eq!(order.total_amount, order.recompute_total().unwrap());
        assert_eq!(order.total_amount.amount, dec!(99.97));
    }

    #[test]
    fn cannot_modify_once_not_pending() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        assert!(order.can_be_modified());
        order.process_payment(&order.total_amount.clone()).unwrap();
        assert!(!order.can_be_modified());
    }

    #[test]
    fn payment_amount_must_match_exactly() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        let wrong = Money::new(dec!(9.99), "DKK").unwrap();
        assert!(order.process_payment(&wrong).is_err());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn full_happy_path_transition_sequence() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        order.process_payment(&order.total_amount.clone()).unwrap();
        order.mark_as_shipped().unwrap();
        order.mark_as_delivered().unwrap();
        order.complete().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.paid_date.is_some());
        assert!(order.shipped_date.is_some());
        assert!(order.delivered_date.is_some());
    }

    #[test]
    fn illegal_transition_rejected() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        assert!(order.mark_as_shipped().is_err());
    }

    #[test]
    fn seller_ids_preserve_first_appearance_order() {
        let order = Order::new(
            "cust-1",
            addr(),
            vec![
                item("s1", 2, dec!(29.99)),
                item("s1", 1, dec!(19.99)),
                item("s2", 1, dec!(39.99)),
            ],
        )
        .unwrap();
        assert_eq!(order.seller_ids(), vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn cancel_from_paid_marks_items_cancelled() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        order.process_payment(&order.total_amount.clone()).unwrap();
        order.cancel("customer request").unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order
            .order_items
            .iter()
            .all(|i| i.item_status == OrderItemStatus::Cancelled));
    }

    #[test]
    fn refund_after_delivered_respects_window() {
        let mut order = Order::new("cust-1", addr(), vec![item("s1", 1, dec!(10))]).unwrap();
        order.process_payment(&order.total_amount.clone()).unwrap();
        order.mark_as_shipped().unwrap();
        order.mark_as_delivered().unwrap();
        order.delivered_date = Some(Utc::now() - chrono::Duration::days(15));
        assert!(order.process_refund("changed mind", 14).is_err());

        order.delivered_date = Some(Utc::now() - chrono::Duration::days(1));
        assert!(order.process_refund("changed mind", 14).is_ok());
        assert_eq!(order.status, OrderStatus::Refunded);
    }

    #[test]
    fn platform_fee_split_matches_scenario_2() {
        let (fee, payout) = platform_fee_and_payout(&Money::new(dec!(79.97), "DKK").unwrap(), dec!(0.10));
        assert_eq!(fee.amount, dec!(8.00));
        assert_eq!(payout.amount, dec!(71.97));
    }
}
