//! Facet-filtered search over the Redis facet sets (spec §4.5 facet indexes;
//! §4.6 Query Layer filter/facet requirement).
//!
//! Mirrors `TextSearchQuery`: a facet-membership lookup (`Facets::isbns_for`)
//! instead of a token-set intersection, the same pagination and hit shape.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::search::{FacetDimension, Facets, IndexStore};

use super::text_search::{hit_from_record, TextSearchHit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetSearchResults {
    pub dimension: FacetDimension,
    pub value: String,
    pub total_count: u64,
    pub items: Vec<TextSearchHit>,
}

pub struct FacetSearchQuery {
    facets: Arc<Facets>,
    store: Arc<IndexStore>,
}

impl FacetSearchQuery {
    pub fn new(facets: Arc<Facets>, store: Arc<IndexStore>) -> Self {
        Self { facets, store }
    }

    pub async fn run(
        &self,
        dimension: FacetDimension,
        value: &str,
        page: u32,
        page_size: u32,
    ) -> Result<FacetSearchResults, AppError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let mut isbns = self.facets.isbns_for(dimension, value).await?;
        isbns.sort();

        let total_count = isbns.len() as u64;
        let start = ((page - 1) * page_size) as usize;
        let page_isbns = isbns.into_iter().skip(start).take(page_size as usize);

        let mut items = Vec::new();
        for isbn in page_isbns {
            if let Some(record) = self.store.load_record(&isbn).await? {
                items.push(hit_from_record(record));
            }
        }

        Ok(FacetSearchResults {
            dimension,
            value: value.to_string(),
            total_count,
            items,
        })
    }
}
