//! ISBN value object (spec §3, §8: `Create` accepts iff digits(s) in {10,13}).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Accepts the raw string, strips common separators (`-`, spaces), and
    /// requires exactly 10 or 13 remaining digit characters (the final ISBN-10
    /// check character `X` is also accepted as a digit-equivalent).
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        let digit_count = cleaned
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
            .count();

        if digit_count != cleaned.len() || (digit_count != 10 && digit_count != 13) {
            return Err(DomainError::InvalidIsbn(raw.to_string()));
        }

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_13_digit_isbn() {
        assert!(Isbn::parse("9780123456789").is_ok());
    }

    #[test]
    fn accepts_10_digit_isbn_with_separators() {
        let isbn = Isbn::parse("0-19-515344-8").unwrap();
        assert_eq!(isbn.as_str(), "0195153448");
    }

    #[test]
    fn rejects_wrong_digit_count() {
        assert!(Isbn::parse("12345").is_err());
        assert!(Isbn::parse("123456789012").is_err());
    }

    #[test]
    fn rejects_non_digit_characters() {
        assert!(Isbn::parse("97801234A6789").is_err());
    }
}
