//! Payment allocation & seller settlement (spec §3, §4.3, §4.4 C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PaymentAllocationStatus {
    Pending,
    Paid,
    Held,
    Reversed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub seller_id: String,
    pub gross_amount: Money,
    pub platform_fee: Money,
    pub net_payout: Money,
    pub status: PaymentAllocationStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentAllocation {
    pub fn new(
        order_id: Uuid,
        order_item_id: Uuid,
        seller_id: impl Into<String>,
        gross_amount: Money,
        platform_fee: Money,
        net_payout: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            order_item_id,
            seller_id: seller_id.into(),
            gross_amount,
            platform_fee,
            net_payout,
            status: PaymentAllocationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn mark_paid(&mut self) {
        self.status = PaymentAllocationStatus::Paid;
    }

    pub fn mark_reversed(&mut self) {
        self.status = PaymentAllocationStatus::Reversed;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SettlementStatus {
    Pending,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerSettlement {
    pub settlement_id: Uuid,
    pub seller_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_payout: Money,
    pub status: SettlementStatus,
}

impl SellerSettlement {
    /// Aggregates PaymentAllocation rows for one seller/period (§4.3
    /// Settlement). `allocations` MUST already be filtered to Paid rows in
    /// that seller/period by the caller.
    pub fn roll_up(
        seller_id: impl Into<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        allocations: &[PaymentAllocation],
    ) -> Option<Self> {
        if allocations.is_empty() {
            return None;
        }
        let currency = allocations[0].net_payout.currency.clone();
        let mut total = Money::zero(currency);
        for alloc in allocations {
            total = total.checked_add(&alloc.net_payout).ok()?;
        }
        Some(Self {
            settlement_id: Uuid::new_v4(),
            seller_id: seller_id.into(),
            period_start,
            period_end,
            total_payout: total,
            status: SettlementStatus::Pending,
        })
    }

    pub fn mark_processed(&mut self) {
        self.status = SettlementStatus::Processed;
    }

    pub fn mark_failed(&mut self) {
        self.status = SettlementStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roll_up_sums_net_payouts_for_seller() {
        let order_id = Uuid::new_v4();
        let allocs = vec![
            PaymentAllocation::new(
                order_id,
                Uuid::new_v4(),
                "s1",
                Money::new(dec!(50), "DKK").unwrap(),
                Money::new(dec!(5), "DKK").unwrap(),
                Money::new(dec!(45), "DKK").unwrap(),
            ),
            PaymentAllocation::new(
                order_id,
                Uuid::new_v4(),
                "s1",
                Money::new(dec!(30), "DKK").unwrap(),
                Money::new(dec!(3), "DKK").unwrap(),
                Money::new(dec!(27), "DKK").unwrap(),
            ),
        ];
        let now = Utc::now();
        let settlement = SellerSettlement::roll_up("s1", now, now, &allocs).unwrap();
        assert_eq!(settlement.total_payout.amount, dec!(72));
        assert_eq!(settlement.status, SettlementStatus::Pending);
    }

    #[test]
    fn roll_up_with_no_allocations_is_none() {
        let now = Utc::now();
        assert!(SellerSettlement::roll_up("s1", now, now, &[]).is_none());
    }
}
