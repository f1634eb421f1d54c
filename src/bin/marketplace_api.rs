//! Marketplace API Service
//!
//! Public HTTP surface for checkout, order confirmation, search, and auth
//! (spec §6). Serves every synchronous endpoint; the asynchronous pipelines
//! (search indexing, compensation, notifications, settlement, session
//! sweeping) run as the sibling binaries under this same `src/bin/`.
//!
//! Environment Variables: see `betterbooks_backend::config::Settings`.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use betterbooks_backend::auth::{AuthState, JwtHandler, UserStore};
use betterbooks_backend::config::Settings;
use betterbooks_backend::events::EventFabric;
use betterbooks_backend::http::{build_router, AppState};
use betterbooks_backend::query::{AvailableBooksQuery, FacetSearchQuery, QueryCache, RateLimitConfig, RateLimiter, TextSearchQuery};
use betterbooks_backend::search::{Autocomplete, Facets, IndexStore};
use betterbooks_backend::services::{CartStore, CheckoutService, OrderRepository, OrderService, SessionStore};
use betterbooks_backend::telemetry;

#[derive(Parser, Debug)]
#[command(name = "marketplace-api")]
#[command(about = "HTTP API for checkout, orders, search and auth")]
struct Args {
    /// Bind address for the HTTP listener.
    #[arg(long, env = "MARKETPLACE_API_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("marketplace-api");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }

    let args = Args::parse();
    let settings = Arc::new(Settings::load());

    info!(bind = %args.bind, "starting marketplace-api");

    let fabric = Arc::new(EventFabric::connect(&settings.broker_url()).await?);
    let redis_client = redis::Client::open(settings.cache_conn.clone())?;

    let order_repo = Arc::new(OrderRepository::new(&settings.db_conn)?);
    let cart_store = Arc::new(CartStore::new(&settings.db_conn)?);
    let session_store = Arc::new(SessionStore::new(redis_client.clone()));
    let payment_service = Arc::new(betterbooks_backend::services::PaymentService::new(
        &settings.db_conn,
        fabric.clone(),
        settings.platform_fee_pct,
    )?);

    let checkout_service = Arc::new(CheckoutService::new(
        session_store.clone(),
        cart_store.clone(),
        order_repo.clone(),
        payment_service.clone(),
        fabric.clone(),
        settings.platform_fee_pct,
        settings.session_ttl_min,
    ));
    let order_service = Arc::new(OrderService::new(order_repo.clone()));

    let available_books_query = Arc::new(AvailableBooksQuery::new(redis_client.clone()));
    let autocomplete = Arc::new(Autocomplete::new(redis_client.clone()));
    let index_store = Arc::new(IndexStore::new(redis_client.clone()));
    let text_search_query = Arc::new(TextSearchQuery::new(index_store.clone(), redis_client.clone()));
    let facets = Arc::new(Facets::new(redis_client.clone()));
    let facet_search_query = Arc::new(FacetSearchQuery::new(facets, index_store));
    let query_cache = Arc::new(QueryCache::new(redis_client.clone()));
    let rate_limiter = RateLimiter::new(
        redis_client.clone(),
        RateLimitConfig {
            per_minute: settings.rate_limit_per_min,
            per_hour: settings.rate_limit_per_hour,
        },
    );

    let user_store = Arc::new(UserStore::new(&settings.db_conn)?);
    let jwt_handler = Arc::new(JwtHandler::new(settings.jwt_key.clone(), settings.jwt_issuer.clone()));
    let auth_state = AuthState::new(user_store, jwt_handler.clone());

    let state = AppState {
        checkout_service,
        order_service,
        order_repo,
        available_books_query,
        text_search_query,
        facet_search_query,
        autocomplete,
        query_cache,
        rate_limiter,
        auth_state,
        jwt_handler,
        fabric,
        redis_client,
        settings,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(bind = %args.bind, "marketplace-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
