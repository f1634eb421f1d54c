//! Session Sweeper Service
//!
//! Periodic backstop that actively reaps expired `CheckoutSession` keys
//! (SPEC_FULL.md §B), independent of the TTL-on-read check the checkout
//! service already performs and independent of Redis's own key expiry —
//! a proactive SCAN catches sessions Redis hasn't expired yet but whose
//! `expires_at` has already passed, and logs them for observability.

use std::time::Duration;

use clap::Parser;
use redis::AsyncCommands;
use tracing::{error, info};

use betterbooks_backend::config::Settings;
use betterbooks_backend::domain::CheckoutSession;
use betterbooks_backend::telemetry;

const SCAN_PATTERN: &str = "checkout_session:*";
const SCAN_BATCH: usize = 200;

#[derive(Parser, Debug)]
#[command(name = "session-sweeper")]
#[command(about = "Reaps expired checkout sessions on a fixed interval")]
struct Args {
    /// How often to sweep, in seconds (default: hourly).
    #[arg(long, env = "SESSION_SWEEP_INTERVAL_SECS", default_value = "3600")]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("session-sweeper");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }
    let args = Args::parse();

    let settings = Settings::load();
    let client = redis::Client::open(settings.cache_conn.clone())?;

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs));
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&client).await {
            error!(error = %err, "session sweep tick failed");
        }
    }
}

async fn sweep_once(client: &redis::Client) -> anyhow::Result<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let now = chrono::Utc::now();

    let mut cursor: u64 = 0;
    let mut reaped = 0u64;
    let mut scanned = 0u64;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(SCAN_PATTERN)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut conn)
            .await?;

        for key in &keys {
            scanned += 1;
            let raw: Option<String> = conn.get(key).await?;
            let Some(raw) = raw else { continue };
            let Ok(session) = serde_json::from_str::<CheckoutSession>(&raw) else {
                continue;
            };
            if session.is_expired(now) {
                let _: i64 = conn.del(key).await?;
                reaped += 1;
            }
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    info!(scanned, reaped, "session sweep complete");
    Ok(())
}
