//! Router assembly for the `marketplace-api` binary (spec §6).

use std::sync::Arc;

use axum::extract::FromRef;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthState, JwtHandler};
use crate::config::Settings;
use crate::events::EventFabric;
use crate::middleware::request_logging;
use crate::query::{AvailableBooksQuery, FacetSearchQuery, QueryCache, RateLimiter, TextSearchQuery};
use crate::query::rate_limit::rate_limit_middleware;
use crate::search::Autocomplete;
use crate::services::{CheckoutService, OrderRepository, OrderService};

use super::{checkout, health, search};

/// Every shared handle a `marketplace-api` request might need. Construction
/// (wiring concrete stores/services from `Settings`) lives in the binary
/// entrypoint; this struct is just the bag of `Arc`s handlers extract from.
#[derive(Clone)]
pub struct AppState {
    pub checkout_service: Arc<CheckoutService>,
    pub order_service: Arc<OrderService>,
    pub order_repo: Arc<OrderRepository>,
    pub available_books_query: Arc<AvailableBooksQuery>,
    pub text_search_query: Arc<TextSearchQuery>,
    pub facet_search_query: Arc<FacetSearchQuery>,
    pub autocomplete: Arc<Autocomplete>,
    pub query_cache: Arc<QueryCache>,
    pub rate_limiter: RateLimiter,
    pub auth_state: AuthState,
    pub jwt_handler: Arc<JwtHandler>,
    pub fabric: Arc<EventFabric>,
    pub redis_client: redis::Client,
    pub settings: Arc<Settings>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth_state.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/orders/checkout/session", post(checkout::create_checkout_session))
        .route("/orders/checkout/confirm", post(checkout::confirm_payment))
        .route_layer(axum_middleware::from_fn_with_state(
            state.jwt_handler.clone(),
            auth_middleware,
        ));

    let search_routes = Router::new()
        .route("/search/available", get(search::search_available))
        .route("/search/autocomplete", get(search::autocomplete))
        .route("/search/query", get(search::text_search))
        .route("/search/facets", get(search::facet_search))
        .route_layer(axum_middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(crate::auth::api::register))
        .route("/auth/login", post(crate::auth::api::login))
        .merge(protected)
        .merge(search_routes)
        .layer(axum_middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
