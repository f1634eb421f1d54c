//! JWT Token Handler
//! Mission: Generate and validate JWT tokens securely

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    issuer: String,
    expiration_hours: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key and issuer (`JWT_KEY` /
    /// `JWT_ISSUER`).
    pub fn new(secret: String, issuer: String) -> Self {
        Self {
            secret,
            issuer,
            expiration_hours: 1,
        }
    }

    /// Generate an access/refresh token pair for a user. The refresh token
    /// is an opaque random value; this crate exposes no endpoint to redeem
    /// one, so its validation is out of scope (spec §6 names only the
    /// bit-shape of the response, not refresh mechanics).
    pub fn generate_token_pair(&self, user: &User) -> Result<(String, String, usize)> {
        let access_token = self.generate_token(user)?;
        let refresh_token = Uuid::new_v4().to_string();
        let expires_in = (self.expiration_hours * 3600) as usize;
        Ok((access_token, refresh_token, expires_in))
    }

    fn generate_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iss: self.issuer.clone(),
            exp: expiration,
        };

        debug!(
            "Generating JWT for user {} ({}), expires in {}h",
            user.email, user.id, self.expiration_hours
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .context("Invalid or expired token")?;

        debug!("Validated JWT for user {}", decoded.claims.email);

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid as UuidType;

    fn create_test_user() -> User {
        User {
            id: UuidType::new_v4(),
            email: "u@gatech.edu".to_string(),
            password_hash: "hash".to_string(),
            failed_login_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string(), "betterbooks".to_string());
        let user = create_test_user();

        let (access, refresh, expires_in) = handler.generate_token_pair(&user).unwrap();
        assert!(!access.is_empty());
        assert!(!refresh.is_empty());
        assert_eq!(expires_in, 3600);

        let claims = handler.validate_token(&access).unwrap();
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.iss, "betterbooks");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string(), "betterbooks".to_string());
        let result = handler.validate_token("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_different_secrets_reject() {
        let handler1 = JwtHandler::new("secret1".to_string(), "betterbooks".to_string());
        let handler2 = JwtHandler::new("secret2".to_string(), "betterbooks".to_string());
        let user = create_test_user();

        let (access, _, _) = handler1.generate_token_pair(&user).unwrap();
        let result = handler2.validate_token(&access);
        assert!(result.is_err());
    }

    #[test]
    fn test_different_issuer_rejects() {
        let handler1 = JwtHandler::new("secret".to_string(), "betterbooks".to_string());
        let handler2 = JwtHandler::new("secret".to_string(), "other-issuer".to_string());
        let user = create_test_user();

        let (access, _, _) = handler1.generate_token_pair(&user).unwrap();
        assert!(handler2.validate_token(&access).is_err());
    }
}
