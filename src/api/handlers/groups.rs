//! Group handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::handlers::conversations::PageQuery;
use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::{AppError, Result};
use crate::models::{Group, GroupMember, GroupRole, JoinPolicy};
use crate::service;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    #[serde(default = "default_join_policy")]
    pub join_condition: JoinPolicy,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

fn default_is_public() -> bool {
    true
}

fn default_join_policy() -> JoinPolicy {
    JoinPolicy::DirectJoin
}

pub async fn create(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>)> {
    let key = service::groups::create_request_key(auth.user_id(), &req.name, &req.member_ids);
    if state.recent_creates.is_duplicate(&key) {
        return Err(AppError::Rate);
    }

    let (group, _conversation) = service::groups::create_group(
        &state.pool,
        auth.user_id(),
        &req.name,
        &req.description,
        &req.avatar_url,
        req.is_public,
        req.join_condition,
        &req.member_ids,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Public group details.
pub async fn get_details(
    State(state): State<ApiState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Group>> {
    let group = service::groups::get_group(&state.pool, group_id).await?;
    Ok(Json(group))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Public group search.
pub async fn search(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Group>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);
    let groups = service::groups::search_public(&state.pool, &query.q, limit, offset).await?;
    Ok(Json(groups))
}

pub async fn my_groups(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Group>>> {
    let (limit, offset) = (page.limit.unwrap_or(50).clamp(1, 100), page.offset.unwrap_or(0).max(0));
    let groups = service::groups::list_for_user(&state.pool, auth.user_id(), limit, offset).await?;
    Ok(Json(groups))
}

pub async fn join(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<GroupMember>> {
    let member = service::groups::join(&state.pool, auth.user_id(), group_id).await?;
    Ok(Json(member))
}

pub async fn leave(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    service::groups::leave(&state.pool, auth.user_id(), group_id).await?;
    Ok(Json(serde_json::json!({ "message": "left group" })))
}

pub async fn members(
    State(state): State<ApiState>,
    _auth: AuthUser,
    Path(group_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<GroupMember>>> {
    let limit = page.limit.unwrap_or(100).clamp(1, 1000);
    let offset = page.offset.unwrap_or(0).max(0);
    let members = service::groups::members(&state.pool, group_id, limit, offset).await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: GroupRole,
}

pub async fn update_member_role(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path((group_id, member_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<GroupMember>> {
    let member = service::groups::update_member_role(
        &state.pool,
        auth.user_id(),
        group_id,
        member_id,
        req.role,
    )
    .await?;
    Ok(Json(member))
}

/// Re-seed the group conversation's participants from the member rows.
/// Admin-only.
pub async fn fix_participants(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let group = service::groups::get_group(&state.pool, group_id).await?;
    service::groups::require_admin(&state.pool, group_id, auth.user_id()).await?;

    let seeded = service::conversations::repair_group_participants(&state.pool, group_id).await?;
    Ok(Json(serde_json::json!({
        "message": "group conversation participants repaired",
        "groupId": group_id,
        "groupName": group.name,
        "participants": seeded,
    })))
}
