//! Per-IP rate limiting at the query boundary (spec §4.6, §5: "atomic
//! increments with TTL on first hit").
//!
//! Grounded on the teacher's `middleware::rate_limit` shape (a `Config` +
//! a tower/axum middleware function returning `TooManyRequests`), adapted
//! from an in-process `HashMap<IpAddr, _>` to Redis counters so the limit
//! holds across service instances.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;
use tracing::warn;

use crate::error::AppError;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    client: redis::Client,
    config: RateLimitConfig,
}

enum Window {
    Minute,
    Hour,
}

impl Window {
    fn ttl_secs(&self) -> u64 {
        match self {
            Window::Minute => 60,
            Window::Hour => 3600,
        }
    }

    fn key(&self, ip: IpAddr) -> String {
        match self {
            Window::Minute => format!("ratelimit:min:{ip}"),
            Window::Hour => format!("ratelimit:hour:{ip}"),
        }
    }
}

impl RateLimiter {
    pub fn new(client: redis::Client, config: RateLimitConfig) -> Self {
        Self { client, config }
    }

    /// Atomically increments both windows; `SET ... NX EX` on first hit
    /// establishes the TTL, subsequent hits just `INCR`. Returns
    /// `Err(retry_after_secs)` once either window's cap is exceeded.
    async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(_) => return Ok(()), // fail-open on cache unavailability
        };

        for (window, cap) in [
            (Window::Minute, self.config.per_minute),
            (Window::Hour, self.config.per_hour),
        ] {
            let key = window.key(ip);
            let count: i64 = match conn.incr(&key, 1).await {
                Ok(c) => c,
                Err(_) => continue,
            };
            if count == 1 {
                let _: Result<(), _> = conn.expire(&key, window.ttl_secs() as i64).await;
            }
            if count as u32 > cap {
                let ttl: i64 = conn.ttl(&key).await.unwrap_or(window.ttl_secs() as i64);
                return Err(ttl.max(1) as u64);
            }
        }
        Ok(())
    }
}

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let ip = addr.ip();
    match limiter.check(ip).await {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => {
            warn!(%ip, retry_after, "rate limit exceeded");
            Err(AppError::too_many_requests(retry_after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keys_are_namespaced_per_ip() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(Window::Minute.key(ip), "ratelimit:min:127.0.0.1");
        assert_eq!(Window::Hour.key(ip), "ratelimit:hour:127.0.0.1");
    }

    #[test]
    fn ttls_match_window_granularity() {
        assert_eq!(Window::Minute.ttl_secs(), 60);
        assert_eq!(Window::Hour.ttl_secs(), 3600);
    }
}
