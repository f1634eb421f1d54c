//! Facet query helpers (spec §4.5: genre/language/format/condition/publisher
//! sets, plus numeric facets as sorted sets).

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetDimension {
    Genre,
    Language,
    Format,
    Condition,
    Publisher,
}

impl FacetDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            FacetDimension::Genre => "genre",
            FacetDimension::Language => "language",
            FacetDimension::Format => "format",
            FacetDimension::Condition => "condition",
            FacetDimension::Publisher => "publisher",
        }
    }
}

pub struct Facets {
    client: redis::Client,
}

impl Facets {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn isbns_for(&self, dimension: FacetDimension, value: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        conn.smembers(keys::facet(dimension.as_str(), value))
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }

    pub async fn count(&self, dimension: FacetDimension, value: &str) -> Result<u64, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        conn.scard(keys::facet(dimension.as_str(), value))
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }

    pub async fn isbns_in_rating_range(&self, min: f64, max: f64) -> Result<Vec<String>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;
        conn.zrangebyscore(keys::facet_numeric("rating"), min, max)
            .await
            .map_err(|e| AppError::transient(e.to_string()))
    }
}
