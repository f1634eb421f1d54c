//! Query-result caching with frequency-boosted TTLs (spec §4.6).

use std::time::Duration;

use metrics::counter;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTier {
    Hot,
    Warm,
    Cold,
    Analytics,
}

impl QueryTier {
    fn base_ttl(self) -> Duration {
        match self {
            QueryTier::Hot => Duration::from_secs(15 * 60),
            QueryTier::Warm => Duration::from_secs(10 * 60),
            QueryTier::Cold => Duration::from_secs(5 * 60),
            QueryTier::Analytics => Duration::from_secs(2 * 60),
        }
    }

    fn label(self) -> &'static str {
        match self {
            QueryTier::Hot => "hot",
            QueryTier::Warm => "warm",
            QueryTier::Cold => "cold",
            QueryTier::Analytics => "analytics",
        }
    }
}

/// Boosts TTL by x1.5 at hit-frequency >= 20/hour and x2 at >= 50/hour
/// (spec §4.6).
fn boosted_ttl(tier: QueryTier, hits_last_hour: u64) -> Duration {
    let base = tier.base_ttl().as_secs_f64();
    let multiplier = if hits_last_hour >= 50 {
        2.0
    } else if hits_last_hour >= 20 {
        1.5
    } else {
        1.0
    };
    Duration::from_secs_f64(base * multiplier)
}

pub struct QueryCache {
    client: redis::Client,
}

impl QueryCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn frequency_key(key: &str) -> String {
        format!("cache:freq:{key}")
    }

    async fn record_hit_frequency(&self, conn: &mut redis::aio::MultiplexedConnection, key: &str) -> u64 {
        let freq_key = Self::frequency_key(key);
        let count: i64 = conn.incr(&freq_key, 1).await.unwrap_or(1);
        if count == 1 {
            let _: Result<(), _> = conn.expire(&freq_key, 3600).await;
        }
        count as u64
    }

    /// Returns the cached value on hit; `None` on miss. Tracks hit/miss
    /// counters per query-type label.
    pub async fn get<T: DeserializeOwned>(&self, tier: QueryTier, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let raw: Option<String> = conn.get(key).await.map_err(|e| AppError::transient(e.to_string()))?;
        self.record_hit_frequency(&mut conn, key).await;

        match raw {
            Some(json) => {
                counter!("query_cache_hits_total", "tier" => tier.label()).increment(1);
                let value = serde_json::from_str(&json).map_err(|e| AppError::unexpected(e.to_string()))?;
                Ok(Some(value))
            }
            None => {
                counter!("query_cache_misses_total", "tier" => tier.label()).increment(1);
                Ok(None)
            }
        }
    }

    pub async fn put<T: Serialize>(&self, tier: QueryTier, key: &str, value: &T) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let hits = self.record_hit_frequency(&mut conn, key).await;
        let ttl = boosted_ttl(tier, hits);
        let body = serde_json::to_string(value).map_err(|e| AppError::unexpected(e.to_string()))?;

        conn.set_ex::<_, _, ()>(key, body, ttl.as_secs())
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_ttls_match_spec_tiers() {
        assert_eq!(QueryTier::Hot.base_ttl(), Duration::from_secs(900));
        assert_eq!(QueryTier::Warm.base_ttl(), Duration::from_secs(600));
        assert_eq!(QueryTier::Cold.base_ttl(), Duration::from_secs(300));
        assert_eq!(QueryTier::Analytics.base_ttl(), Duration::from_secs(120));
    }

    #[test]
    fn frequency_boosts_ttl_at_thresholds() {
        let base = QueryTier::Hot.base_ttl().as_secs_f64();
        assert_eq!(boosted_ttl(QueryTier::Hot, 0).as_secs_f64(), base);
        assert_eq!(boosted_ttl(QueryTier::Hot, 19).as_secs_f64(), base);
        assert_eq!(boosted_ttl(QueryTier::Hot, 20).as_secs_f64(), base * 1.5);
        assert_eq!(boosted_ttl(QueryTier::Hot, 49).as_secs_f64(), base * 1.5);
        assert_eq!(boosted_ttl(QueryTier::Hot, 50).as_secs_f64(), base * 2.0);
    }
}
