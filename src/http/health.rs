//! `GET /health` (spec §6): lightweight dependency pings, not a full readiness
//! probe — mirrors the teacher's existing health-check shape.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;

use super::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: serde_json::Value,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker_ok = state.fabric.is_connected();

    let cache_ok = state
        .redis_client
        .get_multiplexed_async_connection()
        .await
        .is_ok();

    let database_ok = state.order_repo.load(uuid::Uuid::nil()).await.is_ok();

    let status = if broker_ok && cache_ok && database_ok {
        "Healthy"
    } else if cache_ok && database_ok {
        "Degraded"
    } else {
        "Unhealthy"
    };

    Json(HealthResponse {
        status,
        checks: json!({
            "broker": if broker_ok { "up" } else { "down" },
            "database": if database_ok { "up" } else { "down" },
            "cache": if cache_ok { "up" } else { "down" },
        }),
    })
}
