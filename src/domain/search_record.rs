//! BookSearchRecord (spec §3, §4.5 C6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::isbn::Isbn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerOffer {
    pub seller_id: String,
    pub seller_name: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub condition: String,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StockSummary {
    pub total_stock: u32,
    pub available_sellers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PricingSummary {
    pub min: Decimal,
    pub max: Decimal,
    pub avg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSearchRecord {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub year: Option<u32>,
    pub publisher: Option<String>,
    pub image_urls: Vec<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
    pub description: Option<String>,
    pub rating: Option<f32>,
    pub edition: Option<String>,
    pub format: Option<String>,
    pub stock: StockSummary,
    pub pricing: PricingSummary,
    pub sellers: Vec<SellerOffer>,
}

impl BookSearchRecord {
    /// availabilityVisible <=> totalStock > 0 AND availableSellers > 0.
    pub fn is_available(&self) -> bool {
        self.stock.total_stock > 0 && self.stock.available_sellers > 0
    }

    /// Price indexes exclude records with min == 0.
    pub fn is_price_indexable(&self) -> bool {
        self.is_available() && self.pricing.min > Decimal::ZERO
    }

    /// Recomputes stock/pricing summaries from the seller-offer list; called
    /// whenever `sellers` is mutated by an indexing handler.
    pub fn recompute_summaries(&mut self) {
        let available: Vec<&SellerOffer> = self.sellers.iter().filter(|s| s.quantity > 0).collect();
        self.stock.total_stock = available.iter().map(|s| s.quantity).sum();
        self.stock.available_sellers = available.len() as u32;

        if available.is_empty() {
            self.pricing = PricingSummary::default();
            return;
        }
        let min = available.iter().map(|s| s.price).fold(available[0].price, Decimal::min);
        let max = available.iter().map(|s| s.price).fold(available[0].price, Decimal::max);
        let sum: Decimal = available.iter().map(|s| s.price).sum();
        let avg = sum / Decimal::from(available.len());
        self.pricing = PricingSummary { min, max, avg };
    }

    /// Tokenization surface for the inverted index: lowercase, Unicode
    /// word-boundary split of title + author + ISBN.
    pub fn tokens(&self) -> std::collections::HashSet<String> {
        crate::search::tokenizer::tokenize(&format!(
            "{} {} {}",
            self.title,
            self.author,
            self.isbn.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn offer(price: Decimal, qty: u32) -> SellerOffer {
        SellerOffer {
            seller_id: "s1".into(),
            seller_name: None,
            price,
            quantity: qty,
            condition: "new".into(),
            last_updated: chrono::Utc::now(),
        }
    }

    #[test]
    fn availability_requires_stock_and_sellers() {
        let mut rec = BookSearchRecord {
            isbn: Isbn::parse("9780123456789").unwrap(),
            title: "T".into(),
            author: "A".into(),
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
            stock: StockSummary::default(),
            pricing: PricingSummary::default(),
            sellers: vec![],
        };
        assert!(!rec.is_available());

        rec.sellers.push(offer(dec!(12.50), 5));
        rec.recompute_summaries();
        assert!(rec.is_available());
        assert!(rec.is_price_indexable());
    }

    #[test]
    fn zero_price_excluded_from_price_index() {
        let mut rec = BookSearchRecord {
            isbn: Isbn::parse("9780123456789").unwrap(),
            title: "T".into(),
            author: "A".into(),
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
            stock: StockSummary::default(),
            pricing: PricingSummary::default(),
            sellers: vec![offer(Decimal::ZERO, 3)],
        };
        rec.recompute_summaries();
        assert!(rec.is_available());
        assert!(!rec.is_price_indexable());
    }
}
