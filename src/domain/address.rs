//! Address value object (spec §3).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub state: Option<String>,
    pub country: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> Result<Self, DomainError> {
        let street = street.into();
        let city = city.into();
        let postal_code = postal_code.into();
        let country = country.unwrap_or_else(|| "Denmark".to_string());

        if street.len() > 200 {
            return Err(DomainError::InvalidAmount("street exceeds 200 chars".into()));
        }
        if city.len() > 100 {
            return Err(DomainError::InvalidAmount("city exceeds 100 chars".into()));
        }
        if let Some(ref s) = state {
            if s.len() > 100 {
                return Err(DomainError::InvalidAmount("state exceeds 100 chars".into()));
            }
        }
        if postal_code.len() != 4 || !postal_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidPostalCode(postal_code));
        }

        Ok(Self {
            street,
            city,
            postal_code,
            state,
            country,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_postal_code_accepted() {
        let addr = Address::new("Main St 1", "Aarhus", "8000", None, None).unwrap();
        assert_eq!(addr.country, "Denmark");
        assert_eq!(addr.postal_code.len(), 4);
        assert!(addr.postal_code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn non_digit_postal_code_rejected() {
        assert!(Address::new("Main St 1", "Aarhus", "80A0", None, None).is_err());
    }

    #[test]
    fn wrong_length_postal_code_rejected() {
        assert!(Address::new("Main St 1", "Aarhus", "800", None, None).is_err());
        assert!(Address::new("Main St 1", "Aarhus", "80000", None, None).is_err());
    }

    #[test]
    fn street_length_enforced() {
        let long = "a".repeat(201);
        assert!(Address::new(long, "Aarhus", "8000", None, None).is_err());
    }
}
