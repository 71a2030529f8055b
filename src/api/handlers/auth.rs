//! Registration, login, logout

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::service;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

pub async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = service::auth::register(
        &state.pool,
        &req.username,
        &req.nickname,
        req.email.as_deref(),
        &req.password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (token, user) =
        service::auth::login(&state.pool, &state.config.auth, &req.username, &req.password)
            .await?;
    Ok(Json(LoginResponse { token, user }))
}

/// Revoke the caller's session id for the token's remaining lifetime.
pub async fn logout(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AppError::Internal("token carries invalid expiry".to_string()))?;
    state.revocation.revoke(&claims.jti, expires_at).await?;
    tracing::info!(user_id = claims.user_id, "session revoked");
    Ok(Json(serde_json::json!({ "message": "logged out" })))
}
