//! BetterBooks marketplace backend.
//!
//! Exposes the domain model, event fabric, search indexing pipeline, query
//! layer, persistence-backed services, auth, and HTTP surface shared by the
//! six service binaries under `src/bin/`.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod http;
pub mod middleware;
pub mod query;
pub mod search;
pub mod services;
pub mod telemetry;
