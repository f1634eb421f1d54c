//! Query layer: pagination, caching, rate limiting (spec §4.6, C7).

pub mod available_books;
pub mod cache;
pub mod facet_search;
pub mod rate_limit;
pub mod text_search;

pub use available_books::{AvailableBooksPage, AvailableBooksQuery, SortBy, SortOrder};
pub use cache::{QueryCache, QueryTier};
pub use facet_search::{FacetSearchQuery, FacetSearchResults};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use text_search::{TextSearchHit, TextSearchQuery, TextSearchResults};
