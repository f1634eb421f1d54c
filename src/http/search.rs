//! `GET /search/available` (spec §6, §4.6): paginated/sorted available-books
//! query, served through the tiered query cache.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::query::{AvailableBooksPage, FacetSearchResults, QueryTier, SortBy, SortOrder, TextSearchResults};
use crate::search::FacetDimension;

use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailableBooksParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_sort_by")]
    pub sort_by: SortBy,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    20
}
fn default_sort_by() -> SortBy {
    SortBy::Title
}
fn default_sort_order() -> SortOrder {
    SortOrder::Asc
}

pub async fn search_available(
    State(state): State<AppState>,
    Query(params): Query<AvailableBooksParams>,
) -> Result<Json<AvailableBooksPage>, AppError> {
    let cache_key = format!(
        "available:{}:{}:{:?}:{:?}",
        params.page, params.page_size, params.sort_by, params.sort_order
    );

    if let Some(cached) = state.query_cache.get::<AvailableBooksPage>(QueryTier::Hot, &cache_key).await? {
        return Ok(Json(cached));
    }

    let page = state
        .available_books_query
        .run(params.page, params.page_size, params.sort_by, params.sort_order)
        .await?;

    state.query_cache.put(QueryTier::Hot, &cache_key, &page).await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteParams {
    pub prefix: String,
    #[serde(default = "default_max_results")]
    pub max_results: isize,
}

fn default_max_results() -> isize {
    10
}

/// `GET /search/autocomplete` (spec §4.5, §8 scenario 5): prefix-matched
/// title completions, highest popularity first, lexicographic tiebreak.
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let completions = state
        .autocomplete
        .complete(&params.prefix, params.max_results)
        .await?;
    Ok(Json(completions))
}

#[derive(Debug, Deserialize)]
pub struct TextSearchParams {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// `GET /search/query` (spec §4.5's inverted token index: single-word is a
/// direct set read, multi-word is a set intersection across token sets).
pub async fn text_search(
    State(state): State<AppState>,
    Query(params): Query<TextSearchParams>,
) -> Result<Json<TextSearchResults>, AppError> {
    let results = state
        .text_search_query
        .run(&params.q, params.page, params.page_size)
        .await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct FacetSearchParams {
    pub dimension: FacetDimension,
    pub value: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// `GET /search/facets` (spec §4.6 filter/facet queries): ISBNs carrying the
/// given genre/language/format/condition/publisher value, paginated.
pub async fn facet_search(
    State(state): State<AppState>,
    Query(params): Query<FacetSearchParams>,
) -> Result<Json<FacetSearchResults>, AppError> {
    let results = state
        .facet_search_query
        .run(params.dimension, &params.value, params.page, params.page_size)
        .await?;
    Ok(Json(results))
}
