//! HTTP surface for the `marketplace-api` binary (spec §6).

pub mod checkout;
pub mod health;
pub mod routes;
pub mod search;

pub use routes::{build_router, AppState};
