//! Settlement Job Service
//!
//! Periodic batch job that rolls up each seller's Paid allocations for the
//! prior settlement window into a `SellerSettlement` row (spec §4.4,
//! SPEC_FULL.md §B). Runs once a day by default; the window is always the
//! whole calendar day immediately before the tick, so a missed tick is
//! simply caught up by the next one covering the same window again
//! (`roll_up_settlement` overwrites rather than double-counts per period).

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use clap::Parser;
use tracing::{error, info};

use betterbooks_backend::config::Settings;
use betterbooks_backend::events::EventFabric;
use betterbooks_backend::services::PaymentService;
use betterbooks_backend::telemetry;

#[derive(Parser, Debug)]
#[command(name = "settlement-job")]
#[command(about = "Rolls up seller payment allocations into periodic settlements")]
struct Args {
    /// How often to run the rollup, in seconds.
    #[arg(long, env = "SETTLEMENT_INTERVAL_SECS", default_value = "86400")]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("settlement-job");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }
    let args = Args::parse();

    let settings = Settings::load();
    let fabric = Arc::new(EventFabric::connect(&settings.broker_url()).await?);
    let payment_service = Arc::new(PaymentService::new(
        &settings.db_conn,
        fabric,
        settings.platform_fee_pct,
    )?);

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs));
    loop {
        ticker.tick().await;
        if let Err(err) = run_once(&payment_service).await {
            error!(error = %err, "settlement rollup tick failed");
        }
    }
}

async fn run_once(payment_service: &PaymentService) -> anyhow::Result<()> {
    let now = Utc::now();
    let period_end = now
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let period_start = period_end - chrono::Duration::days(1);

    let seller_ids = payment_service.distinct_seller_ids().await?;
    info!(count = seller_ids.len(), %period_start, %period_end, "running settlement rollup");

    for seller_id in seller_ids {
        match payment_service
            .roll_up_settlement(&seller_id, period_start, period_end)
            .await
        {
            Ok(Some(settlement)) => {
                info!(seller_id, settlement_id = %settlement.settlement_id, "settlement created");
            }
            Ok(None) => {}
            Err(err) => error!(seller_id, error = %err, "settlement rollup failed for seller"),
        }
    }

    Ok(())
}
