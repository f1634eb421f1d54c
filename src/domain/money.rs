//! Money value object (spec §3, §8 Money algebra laws).
//! Exact decimal arithmetic — rust_decimal, never f64 — per spec §4.2's
//! explicit "no float substitution" requirement on payment-amount equality.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, Sub};

use crate::error::DomainError;

/// An amount of currency. `amount` is always >= 0; `currency` is an ISO-4217
/// style code ("DKK", "USD", …). Equality and ordering are structural and
/// require matching currencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Result<Self, DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "amount must be >= 0, got {amount}"
            )));
        }
        Ok(Self {
            amount,
            currency: currency.into(),
        })
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch(
                self.currency.clone(),
                other.currency.clone(),
            ));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, DomainError> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_subtract(&self, other: &Money) -> Result<Money, DomainError> {
        self.require_same_currency(other)?;
        if other.amount > self.amount {
            return Err(DomainError::InvalidAmount(
                "subtraction would go negative".to_string(),
            ));
        }
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Multiply by a non-negative integer quantity (e.g. OrderItem.quantity).
    pub fn multiply(&self, n: u32) -> Money {
        Money {
            amount: self.amount * Decimal::from(n),
            currency: self.currency.clone(),
        }
    }

    /// Multiply by a percentage expressed as a fraction (e.g. 0.10 for 10%),
    /// rounding to 2 decimal places with banker's rounding (round-half-to-even),
    /// per spec §4.3 platform fee computation.
    pub fn multiply_fraction_banker_rounded(&self, fraction: Decimal) -> Money {
        let raw = self.amount * fraction;
        let rounded = raw.round_dp_with_strategy(
            2,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        );
        Money {
            amount: rounded,
            currency: self.currency.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.currency == other.currency && self.amount == other.amount
    }
}
impl Eq for Money {}

impl PartialOrd for Money {
    /// Only comparable when currencies match; spec requires this invariant
    /// but the common Rust idiom is to return `None` rather than panic.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.amount.partial_cmp(&other.amount)
    }
}

/// Convenience operator overloads for the happy path; both panic on currency
/// mismatch, matching `Add`/`Sub`'s infallible contract. Callers that need
/// fallibility use `checked_add`/`checked_subtract` directly.
impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        self.checked_add(&rhs)
            .expect("Money::add requires matching currencies")
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        self.checked_subtract(&rhs)
            .expect("Money::sub requires matching currencies")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dkk(amount: Decimal) -> Money {
        Money::new(amount, "DKK").unwrap()
    }

    #[test]
    fn add_then_subtract_is_identity() {
        let a = dkk(dec!(29.99));
        let b = dkk(dec!(19.99));
        let result = a.checked_add(&b).unwrap().checked_subtract(&b).unwrap();
        assert_eq!(result, a);
    }

    #[test]
    fn multiply_by_zero_is_zero() {
        let a = dkk(dec!(29.99));
        assert!(a.multiply(0).is_zero());
    }

    #[test]
    fn multiply_by_n_scales_linearly() {
        let a = dkk(dec!(29.99));
        let scaled = a.multiply(3);
        assert_eq!(scaled.amount, dec!(89.97));
    }

    #[test]
    fn currency_mismatch_rejected() {
        let a = dkk(dec!(10));
        let b = Money::new(dec!(10), "USD").unwrap();
        assert!(a.checked_add(&b).is_err());
    }

    #[test]
    fn subtract_below_zero_rejected() {
        let a = dkk(dec!(5));
        let b = dkk(dec!(10));
        assert!(a.checked_subtract(&b).is_err());
    }

    #[test]
    fn negative_amount_rejected_at_construction() {
        assert!(Money::new(dec!(-1), "DKK").is_err());
    }

    #[test]
    fn banker_rounded_fee_splits_exactly_with_payout() {
        let subtotal = dkk(dec!(79.97));
        let fee = subtotal.multiply_fraction_banker_rounded(dec!(0.10));
        let payout = subtotal.checked_subtract(&fee).unwrap();
        assert_eq!(fee.amount, dec!(8.00));
        assert_eq!(payout.amount, dec!(71.97));
    }
}
