//! Tracing/metrics bootstrap shared by every service binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging. Each binary calls this once at startup,
/// the same way `main.rs::init_tracing` does for the monolithic bot process.
pub fn init_tracing(service_name: &str) {
    let default_filter = format!("{service_name}=info,betterbooks_backend=info,tower_http=info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and return the bound exporter address.
/// Every service exposes `/metrics` via this recorder so cache hit/miss and
/// compensation counters (spec §4.4, §4.6) are observable regardless of the
/// feature Non-goals, which scope out *ranking*, not *observability*.
pub fn install_metrics_recorder() -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .map(|_| ())
}
