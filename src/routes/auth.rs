//! Token issuance
//!
//! Exchanges the configured API user's credentials for a bearer token.

use crate::auth::{create_access_token, verify_password, TokenResponse};
use crate::error::{ApiResult, AppError};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// POST /token
pub async fn issue_token(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let security = &state.settings.security;
    let rejected = || AppError::Unauthorized("Invalid username or password".to_string());

    let Some(password_hash) = security.api_password_hash.as_deref() else {
        warn!("Token requested but no API password hash is configured");
        return Err(rejected());
    };

    if req.username != security.api_user || !verify_password(&req.password, password_hash)? {
        return Err(rejected());
    }

    let token = create_access_token(security, &req.username)?;
    info!(user = %req.username, "Issued access token");

    Ok(Json(token))
}
