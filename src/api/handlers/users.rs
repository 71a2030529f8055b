//! Profile and user search handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::Result;
use crate::models::User;
use crate::service;

/// Public profile by id.
pub async fn get_profile(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>> {
    let user = service::users::get_profile(&state.pool, user_id).await?;
    Ok(Json(user))
}

pub async fn get_me(State(state): State<ApiState>, auth: AuthUser) -> Result<Json<User>> {
    let user = service::users::get_profile(&state.pool, auth.user_id()).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

pub async fn update_me(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let user = service::users::update_profile(
        &state.pool,
        auth.user_id(),
        req.nickname.as_deref(),
        req.avatar_url.as_deref(),
        req.bio.as_deref(),
    )
    .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>> {
    let users = service::users::search(&state.pool, &query.q, auth.user_id()).await?;
    Ok(Json(users))
}
