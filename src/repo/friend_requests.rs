//! Friend request repository

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::error::Result;
use crate::models::{FriendRequest, FriendRequestStatus};
use crate::repo::decode_enum;

const COLUMNS: &str = "id, requester_id, recipient_id, status, message, created_at, updated_at";

fn row_to_request(row: &PgRow) -> std::result::Result<FriendRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(FriendRequest {
        id: row.try_get("id")?,
        requester_id: row.try_get("requester_id")?,
        recipient_id: row.try_get("recipient_id")?,
        status: decode_enum("status", &status, FriendRequestStatus::from_str)?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert_pending(
    ex: impl PgExecutor<'_>,
    requester_id: i64,
    recipient_id: i64,
    message: Option<&str>,
) -> Result<FriendRequest> {
    let row = sqlx::query(&format!(
        "INSERT INTO friend_requests (requester_id, recipient_id, status, message) \
         VALUES ($1, $2, 'pending', $3) RETURNING {COLUMNS}"
    ))
    .bind(requester_id)
    .bind(recipient_id)
    .bind(message)
    .fetch_one(ex)
    .await?;
    Ok(row_to_request(&row)?)
}

pub async fn get_by_id(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<FriendRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM friend_requests WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_request).transpose()?)
}

/// Locked read for the transactional accept/reject path.
pub async fn get_by_id_for_update(
    ex: impl PgExecutor<'_>,
    id: i64,
) -> Result<Option<FriendRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM friend_requests WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_request).transpose()?)
}

/// Any pending request between the pair, in either direction.
pub async fn find_pending_between(
    ex: impl PgExecutor<'_>,
    user_a: i64,
    user_b: i64,
) -> Result<Option<FriendRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM friend_requests \
         WHERE status = 'pending' AND deleted_at IS NULL \
           AND ((requester_id = $1 AND recipient_id = $2) \
             OR (requester_id = $2 AND recipient_id = $1))"
    ))
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_request).transpose()?)
}

pub async fn update_status(
    ex: impl PgExecutor<'_>,
    id: i64,
    status: FriendRequestStatus,
) -> Result<()> {
    sqlx::query("UPDATE friend_requests SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn list_pending_for(
    ex: impl PgExecutor<'_>,
    recipient_id: i64,
) -> Result<Vec<FriendRequest>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM friend_requests \
         WHERE recipient_id = $1 AND status = 'pending' AND deleted_at IS NULL \
         ORDER BY created_at DESC"
    ))
    .bind(recipient_id)
    .fetch_all(ex)
    .await?;
    let requests = rows
        .iter()
        .map(row_to_request)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(requests)
}
