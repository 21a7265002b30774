//! Signup and login handlers.

use crate::auth::issue_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use courier_metadata::models::UserRow;
use courier_metadata::repos::UserRepo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub api_key: String,
}

/// Signup response body.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub result: &'static str,
}

/// POST /signup - Bootstrap the admin user.
///
/// Gated by the configured API key rather than a bearer token, since no
/// user exists yet to authenticate as.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    if request.api_key != state.config.auth.api_key {
        return Err(ApiError::Unauthorized("wrong api key".to_string()));
    }
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let now = OffsetDateTime::now_utc();
    let user = UserRow {
        user_id: Uuid::new_v4(),
        username: request.username,
        password_hash,
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_user(&user).await?;

    tracing::info!(username = %user.username, "admin user created");
    Ok(Json(SignupResponse {
        result: "Successfully created admin user.",
    }))
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /login - Obtain a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .metadata
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid username or password".to_string()))?;

    let verified = bcrypt::verify(&request.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("password verification failed: {e}")))?;
    if !verified {
        return Err(ApiError::Unauthorized(
            "invalid username or password".to_string(),
        ));
    }

    let token = issue_token(
        &user.username,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_secs,
    )?;
    Ok(Json(LoginResponse { token }))
}
