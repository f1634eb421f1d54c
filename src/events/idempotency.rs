//! Idempotency tracking for event consumers (spec §4.1: "handlers MUST be
//! idempotent on (messageId, routingKey)... persist processed messageIds with
//! TTL equal to DLQ horizon").

use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

pub struct IdempotencyStore {
    client: redis::Client,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    /// Atomically marks `key` as processed iff it wasn't already. Returns
    /// `true` when this call is the first to see the key (i.e. the handler
    /// should proceed); `false` means it's a redelivery/duplicate to skip.
    pub async fn mark_if_new(&self, key: &str) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let set: bool = redis::cmd("SET")
            .arg(format!("idempotency:{key}"))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs())
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map(|v| v.is_some())?;

        if !set {
            debug!(key, "duplicate message suppressed by idempotency store");
        }
        Ok(set)
    }

    #[allow(dead_code)]
    async fn contains(&self, key: &str) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.exists(format!("idempotency:{key}")).await
    }
}
