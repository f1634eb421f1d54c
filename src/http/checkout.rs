//! Checkout endpoints: `POST /orders/checkout/session`, `POST /orders/checkout/confirm`
//! (spec §6, §4.3).

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::models::Claims;
use crate::domain::Address;
use crate::error::AppError;

use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddressOverride {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub address_override: Option<AddressOverride>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionDto {
    pub session_id: Uuid,
    pub total_amount: String,
    pub currency: String,
    pub expires_at: String,
}

/// `POST /orders/checkout/session`: snapshots the caller's cart into a
/// per-seller allocation and returns an ephemeral, TTL-bound session.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionDto>, AppError> {
    let address = match payload.address_override {
        Some(a) => Address::new(a.street, a.city, a.postal_code, a.state, a.country)?,
        None => Address::new("Main St 1", "Aarhus", "8000", None, None)?,
    };

    let session = state
        .checkout_service
        .create_checkout_session(&claims.sub, address)
        .await?;

    Ok(Json(CheckoutSessionDto {
        session_id: session.session_id,
        total_amount: session.total_amount.amount.to_string(),
        currency: session.total_amount.currency,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub session_id: Uuid,
    #[allow(dead_code)]
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct OrderDto {
    pub order_id: Uuid,
    pub status: String,
    pub total_amount: String,
    pub currency: String,
}

/// `POST /orders/checkout/confirm`: materializes an Order from the session,
/// settles payment, and transitions it Pending -> Paid.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderDto>), AppError> {
    let order = state
        .checkout_service
        .confirm_payment(payload.session_id, &claims.sub)
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderDto {
            order_id: order.id,
            status: format!("{:?}", order.status),
            total_amount: order.total_amount.amount.to_string(),
            currency: order.total_amount.currency,
        }),
    ))
}
