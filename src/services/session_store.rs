//! Ephemeral CheckoutSession storage (spec §4.3: "sessions are ephemeral,
//! TTL-bound, and MUST NOT survive process restart as a durability
//! guarantee" — Redis with an expiry is the idiomatic fit, mirrored on the
//! `IdempotencyStore`'s `SET ... EX` pattern).

use redis::AsyncCommands;
use uuid::Uuid;

use crate::domain::CheckoutSession;
use crate::error::AppError;

pub struct SessionStore {
    client: redis::Client,
}

impl SessionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(session_id: Uuid) -> String {
        format!("checkout_session:{session_id}")
    }

    pub async fn save(&self, session: &CheckoutSession) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let ttl_secs = (session.expires_at - session.created_at)
            .num_seconds()
            .max(1) as u64;
        let body = serde_json::to_string(session).map_err(|e| AppError::unexpected(e.to_string()))?;

        conn.set_ex::<_, _, ()>(Self::key(session.session_id), body, ttl_secs)
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }

    pub async fn load(&self, session_id: Uuid) -> Result<Option<CheckoutSession>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let raw: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        match raw {
            Some(body) => {
                let session: CheckoutSession =
                    serde_json::from_str(&body).map_err(|e| AppError::unexpected(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        conn.del::<_, ()>(Self::key(session_id))
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }
}
