//! Conversation handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::{AppError, Result};
use crate::models::Message;
use crate::service;
use crate::service::conversations::ConversationSummary;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    fn clamp(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

pub async fn list(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<ConversationSummary>>> {
    let (limit, offset) = page.clamp(20, 100);
    let summaries =
        service::conversations::list_for_user(&state.pool, auth.user_id(), limit, offset).await?;
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateConversationRequest {
    pub target_id: i64,
}

/// Get or create the private conversation with the target user.
pub async fn create_or_get_private(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(req): Json<PrivateConversationRequest>,
) -> Result<Json<serde_json::Value>> {
    if req.target_id <= 0 {
        return Err(AppError::Input("targetId is required".to_string()));
    }
    if !crate::repo::users::exists(&state.pool, req.target_id).await? {
        return Err(AppError::NotFound(format!("user {} not found", req.target_id)));
    }

    let conversation =
        service::conversations::resolve_private(&state.pool, auth.user_id(), req.target_id)
            .await?;

    let other = crate::repo::users::get_basic_info(&state.pool, req.target_id).await?;
    let mut item = serde_json::json!({
        "id": conversation.id,
        "type": conversation.kind,
        "targetId": req.target_id,
        "lastMessageId": conversation.last_message_id,
        "updatedAt": conversation.updated_at,
    });
    if let Some(other) = other {
        item["name"] = serde_json::json!(other.nickname);
        item["username"] = serde_json::json!(other.username);
        item["avatar"] = serde_json::json!(other.avatar_url);
    }
    Ok(Json(item))
}

/// Paged messages of one conversation; the caller must be a participant.
pub async fn messages(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(conversation_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Message>>> {
    let (limit, offset) = page.clamp(50, 200);
    let messages = service::messages::messages_for_conversation(
        &state.pool,
        conversation_id,
        auth.user_id(),
        limit,
        offset,
    )
    .await?;
    Ok(Json(messages))
}
