//! Authentication API Endpoints
//! Mission: Provide registration and login endpoints (spec §6, §8 scenario 1)

use std::sync::Arc;

use axum::{extract::State, response::{IntoResponse, Response}, Json};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::{
    jwt::JwtHandler,
    models::{LoginRequest, RegisterRequest, TokenResponse},
    user_store::{LoginOutcome, UserStore},
};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    if payload.password.len() < 8 {
        return Err(AuthApiError::WeakPassword);
    }

    let user = state
        .user_store
        .register(&payload.email, &payload.password)
        .await
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::UserAlreadyExists)?;

    let (access_token, refresh_token, expires_in) = state
        .jwt_handler
        .generate_token_pair(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!(email = %user.email, "user registered");

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        expires_in,
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    let outcome = state
        .user_store
        .verify_login(&payload.email, &payload.password, Utc::now())
        .await
        .map_err(|_| AuthApiError::InternalError)?;

    let user = match outcome {
        LoginOutcome::Success(user) => user,
        LoginOutcome::Locked => {
            warn!(email = %payload.email, "login attempt against locked account");
            return Err(AuthApiError::AccountLocked);
        }
        LoginOutcome::InvalidCredentials => {
            warn!(email = %payload.email, "failed login attempt");
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    let (access_token, refresh_token, expires_in) = state
        .jwt_handler
        .generate_token_pair(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!(email = %user.email, "login successful");

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        expires_in,
    }))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    AccountLocked,
    UserAlreadyExists,
    WeakPassword,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AuthApiError::AccountLocked => {
                (StatusCode::UNAUTHORIZED, "Account is temporarily locked")
            }
            AuthApiError::UserAlreadyExists => (StatusCode::CONFLICT, "Email already registered"),
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters",
            ),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_api_error_responses() {
        let invalid_creds = AuthApiError::InvalidCredentials.into_response();
        assert_eq!(invalid_creds.status(), StatusCode::UNAUTHORIZED);

        let locked = AuthApiError::AccountLocked.into_response();
        assert_eq!(locked.status(), StatusCode::UNAUTHORIZED);

        let conflict = AuthApiError::UserAlreadyExists.into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
    }
}
