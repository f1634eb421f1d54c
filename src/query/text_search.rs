//! Free-text search over the inverted index (spec §4.5's `index:{token}`
//! sets; §4.5 Analytics: `search:stats:{window}` / `popular:searches:{window}`).
//!
//! Single-word queries are a direct set read; multi-word queries are a set
//! intersection across token sets, exactly as `IndexStore::search_tokens`
//! implements it. This wrapper adds pagination over the matched ISBNs and
//! records search analytics counters.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::domain::search_record::BookSearchRecord;
use crate::error::AppError;
use crate::search::{tokenizer, IndexStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSearchHit {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSearchResults {
    pub query: String,
    pub total_count: u64,
    pub items: Vec<TextSearchHit>,
}

pub struct TextSearchQuery {
    store: std::sync::Arc<IndexStore>,
    client: redis::Client,
}

impl TextSearchQuery {
    pub fn new(store: std::sync::Arc<IndexStore>, client: redis::Client) -> Self {
        Self { store, client }
    }

    pub async fn run(&self, query: &str, page: u32, page_size: u32) -> Result<TextSearchResults, AppError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let tokens: Vec<String> = tokenizer::tokenize(query).into_iter().collect();
        let mut isbns = self.store.search_tokens(&tokens).await?;
        isbns.sort();

        self.record_query(query).await?;

        let total_count = isbns.len() as u64;
        let start = ((page - 1) * page_size) as usize;
        let page_isbns = isbns.into_iter().skip(start).take(page_size as usize);

        let mut items = Vec::new();
        for isbn in page_isbns {
            if let Some(record) = self.store.load_record(&isbn).await? {
                items.push(hit_from_record(record));
            }
        }

        Ok(TextSearchResults {
            query: query.to_string(),
            total_count,
            items,
        })
    }

    /// Bumps `search:stats:{window}` and `popular:searches:{window}` for the
    /// current hourly window (spec §4.5 Analytics).
    async fn record_query(&self, query: &str) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let window = chrono::Utc::now().format("%Y-%m-%dT%H").to_string();
        let _: i64 = conn
            .incr(crate::search::keys::search_stats(&window), 1)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        let _: f64 = conn
            .zincr(crate::search::keys::popular_searches(&window), query.to_lowercase(), 1.0)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        Ok(())
    }
}

pub(crate) fn hit_from_record(record: BookSearchRecord) -> TextSearchHit {
    TextSearchHit {
        isbn: record.isbn.as_str().to_string(),
        title: record.title,
        author: record.author,
        available: record.is_available(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_carries_availability_flag() {
        let record = BookSearchRecord {
            isbn: crate::domain::Isbn::parse("9780123456789").unwrap(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            year: None,
            publisher: None,
            image_urls: vec![],
            genre: None,
            language: None,
            page_count: None,
            description: None,
            rating: None,
            edition: None,
            format: None,
            stock: Default::default(),
            pricing: Default::default(),
            sellers: vec![],
        };
        let hit = hit_from_record(record);
        assert_eq!(hit.isbn, "9780123456789");
        assert!(!hit.available);
    }
}
