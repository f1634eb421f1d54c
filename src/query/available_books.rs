//! `GetAvailableBooks` pagination/sorting (spec §4.6).

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::domain::search_record::{BookSearchRecord, SellerOffer};
use crate::error::AppError;
use crate::search::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Title,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableBookRow {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub seller_id: String,
    pub seller_name: Option<String>,
    pub price: rust_decimal::Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableBooksPage {
    pub items: Vec<AvailableBookRow>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

pub struct AvailableBooksQuery {
    client: redis::Client,
}

impl AvailableBooksQuery {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn run(
        &self,
        page: u32,
        page_size: u32,
        sort_by: SortBy,
        sort_order: SortOrder,
    ) -> Result<AvailableBooksPage, AppError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let set_key = match sort_by {
            SortBy::Title => keys::AVAILABLE_BY_TITLE,
            SortBy::Price => keys::AVAILABLE_BY_PRICE,
        };

        let start = ((page - 1) * page_size) as isize;
        let stop = start + page_size as isize - 1;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let isbns: Vec<String> = match sort_order {
            SortOrder::Asc => conn
                .zrange(set_key, start, stop)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?,
            SortOrder::Desc => conn
                .zrevrange(set_key, start, stop)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?,
        };

        let total_count: u64 = conn
            .zcard(set_key)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let mut items = Vec::new();
        let mut seller_row_counts = Vec::new();
        for isbn in &isbns {
            let raw: Option<String> = conn
                .get(keys::book(isbn))
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
            let Some(raw) = raw else { continue };
            let record: BookSearchRecord =
                serde_json::from_str(&raw).map_err(|e| AppError::unexpected(e.to_string()))?;

            let sellers_raw: Option<String> = conn
                .get(keys::sellers(isbn))
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
            let sellers: Vec<SellerOffer> = match sellers_raw {
                Some(raw) => {
                    serde_json::from_str(&raw).map_err(|e| AppError::unexpected(e.to_string()))?
                }
                None => record.sellers.clone(),
            };

            let available_sellers: Vec<_> = sellers.into_iter().filter(|s| s.quantity > 0).collect();
            seller_row_counts.push(available_sellers.len());
            for seller in available_sellers {
                items.push(AvailableBookRow {
                    isbn: isbn.clone(),
                    title: record.title.clone(),
                    author: record.author.clone(),
                    seller_id: seller.seller_id,
                    seller_name: seller.seller_name,
                    price: seller.price,
                    quantity: seller.quantity,
                });
            }
        }

        let avg_sellers_per_page = if seller_row_counts.is_empty() {
            1.0
        } else {
            seller_row_counts.iter().sum::<usize>() as f64 / seller_row_counts.len() as f64
        };
        let estimated_seller_total = (total_count as f64 * avg_sellers_per_page).ceil() as u64;
        let total_pages = (total_count as f64 / page_size as f64).ceil() as u64;
        let has_next_page = (page as u64) < (estimated_seller_total as f64 / page_size as f64).ceil() as u64;

        Ok(AvailableBooksPage {
            items,
            page,
            page_size,
            total_count,
            total_pages,
            has_next_page,
            has_previous_page: page > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_clamped_to_one_hundred() {
        assert_eq!(101u32.clamp(1, 100), 100);
        assert_eq!(0u32.clamp(1, 100), 1);
    }
}
