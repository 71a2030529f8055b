//! Friend request handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::Result;
use crate::models::{FriendRequest, FriendRequestWithRequester, UserBasicInfo};
use crate::service;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequest {
    pub recipient_id: i64,
}

/// Validate and enqueue; the pending record appears once the consumer runs.
pub async fn send(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(req): Json<SendFriendRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    service::friends::send_request(
        &state.pool,
        &state.publisher,
        &state.config.log.friend_request_topic,
        auth.user_id(),
        req.recipient_id,
    )
    .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "friend request submitted" })),
    ))
}

pub async fn list_pending(
    State(state): State<ApiState>,
    auth: AuthUser,
) -> Result<Json<Vec<FriendRequestWithRequester>>> {
    let pending = service::friends::list_pending(&state.pool, auth.user_id()).await?;
    Ok(Json(pending))
}

pub async fn accept(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(request_id): Path<i64>,
) -> Result<Json<FriendRequest>> {
    let request = service::friends::accept(&state.pool, auth.user_id(), request_id).await?;
    Ok(Json(request))
}

pub async fn reject(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(request_id): Path<i64>,
) -> Result<Json<FriendRequest>> {
    let request = service::friends::reject(&state.pool, auth.user_id(), request_id).await?;
    Ok(Json(request))
}

pub async fn list_friends(
    State(state): State<ApiState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserBasicInfo>>> {
    let friends = service::friends::list_friends(&state.pool, auth.user_id()).await?;
    Ok(Json(friends))
}
