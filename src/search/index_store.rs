//! Redis-backed inverted index, sorted availability sets, per-ISBN seller
//! cache, facets, and autocomplete (spec §4.5).

use redis::AsyncCommands;
use std::collections::HashSet;

use crate::domain::search_record::BookSearchRecord;
use crate::error::AppError;

use super::keys;

pub struct IndexStore {
    client: redis::Client,
}

impl IndexStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }

    pub async fn load_record(&self, isbn: &str) -> Result<Option<BookSearchRecord>, AppError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(keys::book(isbn))
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(|e| AppError::unexpected(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Applies the full set of derived-index writes for one record: diffs
    /// tokens against the previous record (if any), updates token sets,
    /// availability sorted sets, the seller cache, and facets, then writes
    /// the projection itself. All single-key ops are individually atomic;
    /// cross-key consistency relies on single-writer-per-ISBN ordering
    /// (spec §5).
    pub async fn upsert_record(
        &self,
        previous: Option<&BookSearchRecord>,
        record: &BookSearchRecord,
    ) -> Result<(), AppError> {
        let isbn = record.isbn.as_str();
        let mut conn = self.conn().await?;

        let old_tokens: HashSet<String> = previous.map(|r| r.tokens()).unwrap_or_default();
        let new_tokens = record.tokens();

        for lost in old_tokens.difference(&new_tokens) {
            let _: i64 = conn
                .srem(keys::token_index(lost), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        for gained in new_tokens.difference(&old_tokens) {
            let _: i64 = conn
                .sadd(keys::token_index(gained), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        self.update_availability(&mut conn, record).await?;
        self.update_facets(&mut conn, previous, record).await?;
        self.update_seller_index(&mut conn, previous, record).await?;

        let sellers_json =
            serde_json::to_string(&record.sellers).map_err(|e| AppError::unexpected(e.to_string()))?;
        let _: () = conn
            .set(keys::sellers(isbn), sellers_json)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let body = serde_json::to_string(record).map_err(|e| AppError::unexpected(e.to_string()))?;
        let _: () = conn
            .set(keys::book(isbn), body)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        self.invalidate_available_pages(&mut conn).await?;
        Ok(())
    }

    async fn update_availability(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        record: &BookSearchRecord,
    ) -> Result<(), AppError> {
        let isbn = record.isbn.as_str();

        if record.is_available() {
            let score = keys::title_score(&record.title);
            let _: () = conn
                .zadd(keys::AVAILABLE_BY_TITLE, isbn, score)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        } else {
            let _: i64 = conn
                .zrem(keys::AVAILABLE_BY_TITLE, isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        if record.is_price_indexable() {
            let price = record
                .pricing
                .min
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.0);
            let _: () = conn
                .zadd(keys::AVAILABLE_BY_PRICE, isbn, price)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        } else {
            let _: i64 = conn
                .zrem(keys::AVAILABLE_BY_PRICE, isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        Ok(())
    }

    async fn update_facets(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        previous: Option<&BookSearchRecord>,
        record: &BookSearchRecord,
    ) -> Result<(), AppError> {
        let isbn = record.isbn.as_str();

        let dims: [(&str, Option<&String>, Option<&String>); 3] = [
            ("genre", previous.and_then(|p| p.genre.as_ref()), record.genre.as_ref()),
            ("language", previous.and_then(|p| p.language.as_ref()), record.language.as_ref()),
            ("format", previous.and_then(|p| p.format.as_ref()), record.format.as_ref()),
        ];

        for (dimension, old_value, new_value) in dims {
            if old_value == new_value {
                continue;
            }
            if let Some(old) = old_value {
                let _: i64 = conn
                    .srem(keys::facet(dimension, old), isbn)
                    .await
                    .map_err(|e| AppError::transient(e.to_string()))?;
            }
            if let Some(new) = new_value {
                let _: i64 = conn
                    .sadd(keys::facet(dimension, new), isbn)
                    .await
                    .map_err(|e| AppError::transient(e.to_string()))?;
            }
        }

        let old_publishers: HashSet<&String> = previous
            .and_then(|p| p.publisher.as_ref())
            .into_iter()
            .collect();
        let new_publishers: HashSet<&String> = record.publisher.as_ref().into_iter().collect();
        for old in old_publishers.difference(&new_publishers) {
            let _: i64 = conn
                .srem(keys::facet("publisher", old), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        for new in new_publishers.difference(&old_publishers) {
            let _: i64 = conn
                .sadd(keys::facet("publisher", new), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        for offer in &record.sellers {
            let _: i64 = conn
                .sadd(keys::facet("condition", &offer.condition), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        if let Some(rating) = record.rating {
            let _: () = conn
                .zadd(keys::facet_numeric("rating"), isbn, rating as f64)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        if record.pricing.min > rust_decimal::Decimal::ZERO {
            let bucket = price_bucket(record.pricing.min);
            let _: () = conn
                .zadd(keys::facet_numeric("price_bucket"), isbn, bucket)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        Ok(())
    }

    async fn update_seller_index(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        previous: Option<&BookSearchRecord>,
        record: &BookSearchRecord,
    ) -> Result<(), AppError> {
        let isbn = record.isbn.as_str();
        let old_sellers: HashSet<&str> = previous
            .map(|p| p.sellers.iter().map(|s| s.seller_id.as_str()).collect())
            .unwrap_or_default();
        let new_sellers: HashSet<&str> = record.sellers.iter().map(|s| s.seller_id.as_str()).collect();

        for lost in old_sellers.difference(&new_sellers) {
            let _: i64 = conn
                .srem(keys::seller_isbns(lost), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        for gained in new_sellers.difference(&old_sellers) {
            let _: i64 = conn
                .sadd(keys::seller_isbns(gained), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        Ok(())
    }

    /// All ISBNs a seller currently has an offer on (spec §4.5 seller
    /// display-name write-through).
    pub async fn isbns_for_seller(&self, seller_id: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.conn().await?;
        conn.smembers(keys::seller_isbns(seller_id))
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }

    /// `BookDeleted`: remove ISBN from every token set it appeared in,
    /// delete the projection, and remove from availability sorted sets.
    pub async fn delete_record(&self, previous: &BookSearchRecord) -> Result<(), AppError> {
        let isbn = previous.isbn.as_str();
        let mut conn = self.conn().await?;

        for token in previous.tokens() {
            let _: i64 = conn
                .srem(keys::token_index(&token), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        for seller in &previous.sellers {
            let _: i64 = conn
                .srem(keys::seller_isbns(&seller.seller_id), isbn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }

        let _: i64 = conn
            .zrem(keys::AVAILABLE_BY_TITLE, isbn)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        let _: i64 = conn
            .zrem(keys::AVAILABLE_BY_PRICE, isbn)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let _: i64 = conn
            .del(keys::book(isbn))
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        let _: i64 = conn
            .del(keys::sellers(isbn))
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        self.invalidate_available_pages(&mut conn).await?;
        Ok(())
    }

    /// Single-word lookup is a direct set read; multi-word search is a set
    /// intersection across token sets (spec §4.5).
    pub async fn search_tokens(&self, query_tokens: &[String]) -> Result<Vec<String>, AppError> {
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        if query_tokens.len() == 1 {
            let members: Vec<String> = conn
                .smembers(keys::token_index(&query_tokens[0]))
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
            return Ok(members);
        }
        let index_keys: Vec<String> = query_tokens.iter().map(|t| keys::token_index(t)).collect();
        let result: Vec<String> = conn
            .sinter(index_keys)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        Ok(result)
    }

    async fn invalidate_available_pages(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
    ) -> Result<(), AppError> {
        let mut keys_to_delete = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(keys::available_page_pattern())
                .query_async(conn)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
            keys_to_delete.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        if !keys_to_delete.is_empty() {
            let _: i64 = conn
                .del(keys_to_delete)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
        }
        Ok(())
    }
}

fn price_bucket(price: rust_decimal::Decimal) -> f64 {
    let as_f64: f64 = price.to_string().parse().unwrap_or(0.0);
    (as_f64 / 10.0).floor()
}
