//! Ephemeral checkout session & multi-seller allocation (spec §3, §4.3).

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::cart::ShoppingCart;
use super::money::Money;
use super::order::platform_fee_and_payout;
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerAllocation {
    pub seller_id: String,
    pub subtotal: Money,
    pub platform_fee: Money,
    pub seller_payout: Money,
    pub items: Vec<super::cart::CartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: Uuid,
    pub customer_id: String,
    pub allocations: Vec<SellerAllocation>,
    pub total_amount: Money,
    pub delivery_address: Address,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// §4.3 CreateCheckoutSession steps 3–4.
    pub fn build(
        customer_id: impl Into<String>,
        cart: &ShoppingCart,
        delivery_address: Address,
        platform_fee_pct: Decimal,
        ttl_minutes: i64,
    ) -> Result<Self, DomainError> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let currency = cart
            .items
            .values()
            .next()
            .map(|i| i.unit_price.currency.clone())
            .unwrap_or_else(|| "DKK".to_string());

        let groups = cart.group_by_seller();
        let mut seller_ids: Vec<&String> = groups.keys().collect();
        seller_ids.sort();

        let mut allocations = Vec::with_capacity(seller_ids.len());
        let mut total = Money::zero(currency.clone());

        for seller_id in seller_ids {
            let items = &groups[seller_id];
            let mut subtotal = Money::zero(currency.clone());
            for item in items.iter() {
                subtotal = subtotal.checked_add(&item.unit_price.multiply(item.quantity))?;
            }
            let (fee, payout) = platform_fee_and_payout(&subtotal, platform_fee_pct);
            total = total.checked_add(&subtotal)?;
            allocations.push(SellerAllocation {
                seller_id: seller_id.clone(),
                subtotal,
                platform_fee: fee,
                seller_payout: payout,
                items: items.iter().map(|i| (*i).clone()).collect(),
            });
        }

        let now = Utc::now();
        Ok(Self {
            session_id: Uuid::new_v4(),
            customer_id: customer_id.into(),
            allocations,
            total_amount: total,
            delivery_address,
            created_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// §8: sum of per-seller subtotals == totalAmount; sum of
    /// (sellerPayout + platformFee) == totalAmount within 0.01 tolerance.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let mut subtotal_sum = Money::zero(self.total_amount.currency.clone());
        let mut payout_plus_fee_sum = Money::zero(self.total_amount.currency.clone());
        for alloc in &self.allocations {
            subtotal_sum = subtotal_sum.checked_add(&alloc.subtotal)?;
            payout_plus_fee_sum = payout_plus_fee_sum
                .checked_add(&alloc.seller_payout)?
                .checked_add(&alloc.platform_fee)?;
        }
        if subtotal_sum.amount != self.total_amount.amount {
            return Err(DomainError::InvalidAmount(
                "sum of seller subtotals does not equal total".into(),
            ));
        }
        let diff = (payout_plus_fee_sum.amount - self.total_amount.amount).abs();
        if diff > Decimal::new(1, 2) {
            return Err(DomainError::InvalidAmount(
                "payout+fee does not reconcile with total within tolerance".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::isbn::Isbn;
    use rust_decimal_macros::dec;

    fn addr() -> Address {
        Address::new("Main St 1", "Aarhus", "8000", None, None).unwrap()
    }

    #[test]
    fn scenario_2_totals_and_allocations() {
        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(
            Isbn::parse("9780123456789").unwrap(),
            "s1",
            2,
            Money::new(dec!(29.99), "DKK").unwrap(),
        )
        .unwrap();
        cart.add_item(
            Isbn::parse("9780123456790").unwrap(),
            "s1",
            1,
            Money::new(dec!(19.99), "DKK").unwrap(),
        )
        .unwrap();
        cart.add_item(
            Isbn::parse("9780123456791").unwrap(),
            "s2",
            1,
            Money::new(dec!(39.99), "DKK").unwrap(),
        )
        .unwrap();

        let session = CheckoutSession::build("cust-1", &cart, addr(), dec!(0.10), 30).unwrap();
        assert_eq!(session.total_amount.amount, dec!(119.96));

        let s1 = session.allocations.iter().find(|a| a.seller_id == "s1").unwrap();
        let s2 = session.allocations.iter().find(|a| a.seller_id == "s2").unwrap();
        assert_eq!(s1.subtotal.amount, dec!(79.97));
        assert_eq!(s2.subtotal.amount, dec!(39.99));
        assert_eq!(s1.seller_payout.amount, dec!(71.97));
        assert_eq!(s2.seller_payout.amount, dec!(35.99));

        session.check_invariants().unwrap();
    }

    #[test]
    fn empty_cart_rejected() {
        let cart = ShoppingCart::new("cust-1");
        assert!(CheckoutSession::build("cust-1", &cart, addr(), dec!(0.10), 30).is_err());
    }

    #[test]
    fn expiry_is_ttl_minutes_after_creation() {
        let mut cart = ShoppingCart::new("cust-1");
        cart.add_item(
            Isbn::parse("9780123456789").unwrap(),
            "s1",
            1,
            Money::new(dec!(10), "DKK").unwrap(),
        )
        .unwrap();
        let session = CheckoutSession::build("cust-1", &cart, addr(), dec!(0.10), 30).unwrap();
        assert!(!session.is_expired(session.created_at));
        assert!(session.is_expired(session.created_at + Duration::minutes(31)));
    }
}
