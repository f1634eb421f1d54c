//! Request logging middleware shared across HTTP-serving binaries.
//!
//! Per-IP rate limiting lives in `crate::query::rate_limit` instead, since
//! it shares the Redis connection the query cache and search projection
//! already hold open.

pub mod logging;

pub use logging::request_logging;
