//! Authentication Models
//! Mission: Define secure user and authentication data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account. Lockout bookkeeping (spec §7, §8 scenario 1) lives on the
/// row itself rather than a side table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub email: String,
    pub iss: String,
    pub exp: usize, // expiration timestamp
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token response shared by `/auth/register` and `/auth/login` (spec §6).
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@gatech.edu".to_string(),
            password_hash: "hash".to_string(),
            failed_login_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unlocked_user_is_not_locked() {
        assert!(!user().is_locked(Utc::now()));
    }

    #[test]
    fn test_lock_expires_after_its_timestamp() {
        let mut u = user();
        let now = Utc::now();
        u.locked_until = Some(now + Duration::minutes(15));
        assert!(u.is_locked(now));
        assert!(!u.is_locked(now + Duration::minutes(16)));
    }
}
