//! Redis key schema for the search indexing pipeline (spec §4.5).

pub fn book(isbn: &str) -> String {
    format!("book:{isbn}")
}

pub fn token_index(token: &str) -> String {
    format!("index:{token}")
}

pub const AVAILABLE_BY_TITLE: &str = "available:books:by:title";
pub const AVAILABLE_BY_PRICE: &str = "available:books:by:price";

pub fn sellers(isbn: &str) -> String {
    format!("sellers:{isbn}")
}

pub fn facet(dimension: &str, value: &str) -> String {
    format!("facet:{dimension}:{value}")
}

/// Reverse index of which ISBNs a seller currently has an offer on, so a
/// `SellerCreated`/`UserUpdated` display-name change can write through to
/// every indexed offer without scanning the whole catalog.
pub fn seller_isbns(seller_id: &str) -> String {
    format!("seller:isbns:{seller_id}")
}

pub fn facet_numeric(dimension: &str) -> String {
    format!("facet:{dimension}")
}

pub fn autocomplete(prefix: &str) -> String {
    format!("autocomplete:{prefix}")
}

pub fn search_stats(window: &str) -> String {
    format!("search:stats:{window}")
}

pub fn popular_searches(window: &str) -> String {
    format!("popular:searches:{window}")
}

pub fn available_page_pattern() -> &'static str {
    "available:page:*"
}

/// Deterministic, sortable score for a title: the first 8 lowercase ASCII
/// bytes packed big-endian into a float in [0, 1), so ZRANGE ordering
/// matches lexicographic title ordering (spec §4.5: "scored by a
/// deterministic 8-char title prefix encoded into a double").
pub fn title_score(title: &str) -> f64 {
    let lower = title.to_lowercase();
    let bytes: Vec<u8> = lower.bytes().take(8).collect();
    let mut value: f64 = 0.0;
    for (i, b) in bytes.iter().enumerate() {
        value += (*b as f64) / 256f64.powi(i as i32 + 1);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_score_preserves_lexicographic_order() {
        let a = title_score("Apple");
        let b = title_score("Banana");
        let c = title_score("apple"); // case-insensitive
        assert!(a < b);
        assert_eq!(a, c);
    }

    #[test]
    fn title_score_is_stable_and_bounded() {
        let s = title_score("Zzzzzzzz");
        assert!(s < 1.0);
        assert!(s > 0.0);
    }
}
