//! Search Indexer Service
//!
//! Consumes book and stock lifecycle events and maintains the Redis-backed
//! search projection (spec §4.5). Single-writer-per-ISBN is achieved by
//! running one consumer against one shared durable queue; `partition_for`
//! is kept available for a future deployment that shards across queues, but
//! at this scale one instance drains the whole queue in order.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use futures_util::{stream, StreamExt};

use betterbooks_backend::config::Settings;
use betterbooks_backend::events::{Exchange, EventFabric, RoutingKey};
use betterbooks_backend::search::handlers::{
    handle_book_created, handle_book_deleted, handle_book_stock_updated, handle_book_updated,
    handle_seller_name_sync, BookUpsertPayload, StockUpdatePayload,
};
use betterbooks_backend::search::{Autocomplete, IndexStore};
use betterbooks_backend::services::CrossServiceSync;
use betterbooks_backend::telemetry;

const SELLER_NAME_REFRESH_CONCURRENCY: usize = 10;

const QUEUE_NAME: &str = "search_indexer.events";
const CONSUMER_TAG: &str = "search-indexer";

#[derive(Parser, Debug)]
#[command(name = "search-indexer")]
#[command(about = "Maintains the search projection from book/stock/seller events")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("search-indexer");
    if let Err(err) = telemetry::install_metrics_recorder() {
        tracing::warn!(error = %err, "metrics recorder already installed, continuing");
    }
    let _args = Args::parse();

    let settings = Settings::load();
    let fabric = Arc::new(EventFabric::connect(&settings.broker_url()).await?);
    let redis_client = redis::Client::open(settings.cache_conn.clone())?;
    let store = Arc::new(IndexStore::new(redis_client.clone()));
    let autocomplete = Arc::new(Autocomplete::new(redis_client));
    let cross_service_sync = Arc::new(CrossServiceSync::new(&settings.db_conn)?);

    seller_name_refresh(&store, &cross_service_sync).await;

    fabric
        .declare_consumer_topology(
            Exchange::BookEvents,
            QUEUE_NAME,
            &[
                RoutingKey::BookCreated,
                RoutingKey::BookUpdated,
                RoutingKey::BookDeleted,
                RoutingKey::BookStockUpdated,
            ],
        )
        .await?;
    fabric
        .declare_consumer_topology(
            Exchange::UserEvents,
            "search_indexer.seller_events",
            &[RoutingKey::SellerCreated, RoutingKey::UserUpdated],
        )
        .await?;

    info!(queue = QUEUE_NAME, "search-indexer consuming");

    let book_store = store.clone();
    let book_autocomplete = autocomplete.clone();
    let fabric_books = fabric.clone();
    let seller_store = store.clone();
    let prefetch = settings.consumer_prefetch;

    let book_events = tokio::spawn(async move {
        fabric_books
            .consume(QUEUE_NAME, CONSUMER_TAG, prefetch, 5, move |routing_key, body, _headers| {
                let store = book_store.clone();
                let autocomplete = book_autocomplete.clone();
                async move { dispatch_book_event(&store, &autocomplete, &routing_key, &body).await }
            })
            .await
    });

    let seller_events = tokio::spawn(async move {
        fabric
            .consume(
                "search_indexer.seller_events",
                "search-indexer-sellers",
                prefetch,
                5,
                move |routing_key, body, _headers| {
                    let store = seller_store.clone();
                    async move { dispatch_seller_event(&store, &routing_key, &body).await }
                },
            )
            .await
    });

    let (a, b) = tokio::try_join!(book_events, seller_events)?;
    a?;
    b?;
    Ok(())
}

/// `SellerNameRefresh`: on boot, re-syncs every indexed offer's cached
/// `seller_name` against the authoritative seller profile table, bounded to
/// 10 concurrent rewrites so a large catalog can't starve the event loop.
async fn seller_name_refresh(store: &Arc<IndexStore>, cross_service_sync: &Arc<CrossServiceSync>) {
    let sellers = match cross_service_sync.list_sellers().await {
        Ok(sellers) => sellers,
        Err(err) => {
            warn!(error = %err, "seller name refresh: failed to list sellers, skipping backfill");
            return;
        }
    };

    info!(count = sellers.len(), "seller name refresh starting");

    stream::iter(sellers)
        .for_each_concurrent(SELLER_NAME_REFRESH_CONCURRENCY, |seller| {
            let store = store.clone();
            async move {
                match store.isbns_for_seller(&seller.seller_id).await {
                    Ok(isbns) if !isbns.is_empty() => {
                        if let Err(err) =
                            handle_seller_name_sync(&store, &isbns, &seller.seller_id, &seller.seller_name).await
                        {
                            warn!(seller_id = %seller.seller_id, error = %err, "seller name refresh failed");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(seller_id = %seller.seller_id, error = %err, "seller name refresh lookup failed"),
                }
            }
        })
        .await;

    info!("seller name refresh complete");
}

async fn dispatch_book_event(
    store: &IndexStore,
    autocomplete: &Autocomplete,
    routing_key: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    match routing_key {
        "BookCreated" => {
            let payload: BookUpsertPayload = serde_json::from_slice(body)?;
            handle_book_created(store, autocomplete, payload).await?;
        }
        "BookUpdated" => {
            let payload: BookUpsertPayload = serde_json::from_slice(body)?;
            handle_book_updated(store, autocomplete, payload).await?;
        }
        "BookDeleted" => {
            let payload: serde_json::Value = serde_json::from_slice(body)?;
            let isbn = payload["isbn"].as_str().unwrap_or_default();
            handle_book_deleted(store, isbn).await?;
        }
        "BookStockUpdated" => {
            let payload: StockUpdatePayload = serde_json::from_slice(body)?;
            handle_book_stock_updated(store, payload).await?;
        }
        other => warn!(routing_key = other, "unhandled routing key on book queue"),
    }
    Ok(())
}

async fn dispatch_seller_event(store: &IndexStore, routing_key: &str, body: &[u8]) -> anyhow::Result<()> {
    #[derive(serde::Deserialize)]
    struct SellerNamePayload {
        seller_id: String,
        seller_name: String,
    }

    match routing_key {
        "SellerCreated" | "UserUpdated" => {
            let payload: SellerNamePayload = serde_json::from_slice(body)?;
            let isbns = store.isbns_for_seller(&payload.seller_id).await?;
            if !isbns.is_empty() {
                handle_seller_name_sync(store, &isbns, &payload.seller_id, &payload.seller_name).await?;
            }
        }
        other => warn!(routing_key = other, "unhandled routing key on seller queue"),
    }
    Ok(())
}
