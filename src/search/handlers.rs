//! Event handlers for the search indexing pipeline (spec §4.5).
//!
//! Indexing handlers are single-writer per ISBN: consumers are
//! hash-partitioned by ISBN (spec §5, SPEC_FULL.md §D Open Question #1) so
//! diff-against-previous-record never races within a partition.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use serde::Deserialize;

use crate::domain::search_record::{BookSearchRecord, SellerOffer};
use crate::domain::Isbn;
use crate::error::AppError;

use super::autocomplete::Autocomplete;
use super::index_store::IndexStore;

/// Deterministic partition assignment for hash-partition-by-ISBN consumers.
pub fn partition_for(isbn: &str, partition_count: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    isbn.hash(&mut hasher);
    (hasher.finish() % partition_count as u64) as u32
}

#[derive(Debug, Deserialize)]
pub struct BookUpsertPayload {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: Option<u32>,
    pub publisher: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
    pub description: Option<String>,
    pub rating: Option<f32>,
    pub edition: Option<String>,
    pub format: Option<String>,
}

pub async fn handle_book_created(
    store: &IndexStore,
    autocomplete: &Autocomplete,
    payload: BookUpsertPayload,
) -> Result<(), AppError> {
    let isbn = Isbn::parse(&payload.isbn)?;
    let previous = store.load_record(isbn.as_str()).await?;

    let record = BookSearchRecord {
        isbn,
        title: payload.title,
        author: payload.author,
        year: payload.year,
        publisher: payload.publisher,
        image_urls: payload.image_urls,
        genre: payload.genre,
        language: payload.language,
        page_count: payload.page_count,
        description: payload.description,
        rating: payload.rating,
        edition: payload.edition,
        format: payload.format,
        stock: previous.as_ref().map(|p| p.stock.clone()).unwrap_or_default(),
        pricing: previous.as_ref().map(|p| p.pricing.clone()).unwrap_or_default(),
        sellers: previous.as_ref().map(|p| p.sellers.clone()).unwrap_or_default(),
    };

    store.upsert_record(previous.as_ref(), &record).await?;
    autocomplete.index_title(&record.title).await
}

/// `BookUpdated` follows the same diff-and-replace contract as `BookCreated`
/// — the field set it mutates is metadata, not stock/price.
pub async fn handle_book_updated(
    store: &IndexStore,
    autocomplete: &Autocomplete,
    payload: BookUpsertPayload,
) -> Result<(), AppError> {
    handle_book_created(store, autocomplete, payload).await
}

pub async fn handle_book_deleted(store: &IndexStore, isbn_raw: &str) -> Result<(), AppError> {
    let isbn = Isbn::parse(isbn_raw)?;
    if let Some(previous) = store.load_record(isbn.as_str()).await? {
        store.delete_record(&previous).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct StockUpdatePayload {
    pub isbn: String,
    pub seller_id: String,
    pub seller_name: Option<String>,
    pub price: rust_decimal::Decimal,
    pub quantity: u32,
    pub condition: String,
}

/// `BookStockUpdated`: merges one seller's stock/price into the record,
/// conditionally moving it in/out of the availability sorted sets.
pub async fn handle_book_stock_updated(store: &IndexStore, payload: StockUpdatePayload) -> Result<(), AppError> {
    let isbn = Isbn::parse(&payload.isbn)?;
    let previous = store
        .load_record(isbn.as_str())
        .await?
        .ok_or_else(|| AppError::not_found(format!("book {} not indexed yet", isbn.as_str())))?;

    let mut record = previous.clone();
    record.sellers.retain(|s| s.seller_id != payload.seller_id);
    record.sellers.push(SellerOffer {
        seller_id: payload.seller_id,
        seller_name: payload.seller_name,
        price: payload.price,
        quantity: payload.quantity,
        condition: payload.condition,
        last_updated: Utc::now(),
    });
    record.recompute_summaries();

    store.upsert_record(Some(&previous), &record).await
}

/// `SellerCreated` / `UserUpdated`: write-through of the seller's display
/// name into every indexed offer from that seller.
pub async fn handle_seller_name_sync(
    store: &IndexStore,
    isbns_for_seller: &[String],
    seller_id: &str,
    seller_name: &str,
) -> Result<(), AppError> {
    for isbn_raw in isbns_for_seller {
        let isbn = Isbn::parse(isbn_raw)?;
        if let Some(previous) = store.load_record(isbn.as_str()).await? {
            let mut record = previous.clone();
            for offer in record.sellers.iter_mut() {
                if offer.seller_id == seller_id {
                    offer.seller_name = Some(seller_name.to_string());
                }
            }
            store.upsert_record(Some(&previous), &record).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_assignment_is_deterministic() {
        let a = partition_for("9780123456789", 8);
        let b = partition_for("9780123456789", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn partition_assignment_is_bounded() {
        for isbn in ["9780123456789", "9780123456790", "0195153448"] {
            assert!(partition_for(isbn, 4) < 4);
        }
    }
}
