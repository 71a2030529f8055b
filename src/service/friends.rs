//! Friend-request workflow
//!
//! The send path validates synchronously and publishes an event; the
//! pending record is materialized by the consumer, which re-runs the checks
//! so retries and races cannot create duplicates. Accept and reject are
//! transactional.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::bus::Publisher;
use crate::error::{AppError, Result};
use crate::models::{
    FriendRequest, FriendRequestStatus, FriendRequestWithRequester, UserBasicInfo,
};
use crate::repo;
use crate::wire::FriendRequestEvent;

/// Validate and enqueue a friend request.
pub async fn send_request(
    pool: &PgPool,
    publisher: &Arc<dyn Publisher>,
    topic: &str,
    requester_id: i64,
    recipient_id: i64,
) -> Result<()> {
    if requester_id == recipient_id {
        return Err(AppError::Input("cannot befriend yourself".to_string()));
    }

    if !repo::users::exists(pool, recipient_id).await? {
        return Err(AppError::NotFound(format!("user {recipient_id} not found")));
    }

    if repo::friendships::are_friends(pool, requester_id, recipient_id).await? {
        return Err(AppError::Conflict("already friends".to_string()));
    }

    if repo::friend_requests::find_pending_between(pool, requester_id, recipient_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "friend request already pending".to_string(),
        ));
    }

    let event = FriendRequestEvent {
        requester_user_id: requester_id,
        recipient_user_id: recipient_id,
        timestamp: Utc::now(),
    };
    let payload = serde_json::to_vec(&event)
        .map_err(|e| AppError::Internal(format!("serializing friend request event: {e}")))?;
    publisher
        .publish(topic, event.key().as_bytes(), &payload)
        .await?;

    tracing::info!(requester_id, recipient_id, "friend request event published");
    Ok(())
}

/// Consumer handler: materialize the pending record exactly once.
///
/// Returns `Ok` for success and for permanently bad events; `Err` only for
/// transient store failures, leaving the offset uncommitted for retry.
pub async fn process_event(pool: &PgPool, payload: &[u8]) -> Result<()> {
    let event: FriendRequestEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "skipping undecodable friend request event");
            return Ok(());
        }
    };

    // Re-run the send-path checks; the event may be a retry or may have been
    // overtaken by an accept in the other direction.
    if repo::friendships::are_friends(pool, event.requester_user_id, event.recipient_user_id)
        .await?
    {
        tracing::debug!(
            requester = event.requester_user_id,
            recipient = event.recipient_user_id,
            "already friends, skipping request creation"
        );
        return Ok(());
    }

    if repo::friend_requests::find_pending_between(
        pool,
        event.requester_user_id,
        event.recipient_user_id,
    )
    .await?
    .is_some()
    {
        tracing::debug!(
            requester = event.requester_user_id,
            recipient = event.recipient_user_id,
            "pending request already exists, skipping"
        );
        return Ok(());
    }

    match repo::friend_requests::insert_pending(
        pool,
        event.requester_user_id,
        event.recipient_user_id,
        None,
    )
    .await
    {
        Ok(request) => {
            tracing::info!(request_id = request.id, "friend request created");
            Ok(())
        }
        // A concurrent consumer won the partial-unique race; the record
        // exists, which is what we wanted.
        Err(AppError::Database(sqlx::Error::Database(e)))
            if e.constraint() == Some("friend_requests_pending_pair_key") =>
        {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Accept a pending request: recipient-only, transactional, idempotent when
/// the friendship already exists.
pub async fn accept(pool: &PgPool, recipient_id: i64, request_id: i64) -> Result<FriendRequest> {
    let mut tx = pool.begin().await?;

    let request = repo::friend_requests::get_by_id_for_update(&mut *tx, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("friend request not found".to_string()))?;

    if request.recipient_id != recipient_id {
        return Err(AppError::Forbidden(
            "only the recipient can accept a friend request".to_string(),
        ));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(AppError::Conflict(format!(
            "friend request is already {}",
            request.status.as_str()
        )));
    }

    let already_friends =
        repo::friendships::are_friends(&mut *tx, request.requester_id, request.recipient_id)
            .await?;

    repo::friend_requests::update_status(&mut *tx, request_id, FriendRequestStatus::Accepted)
        .await?;

    if !already_friends {
        repo::friendships::insert(&mut *tx, request.requester_id, request.recipient_id).await?;
    }

    tx.commit().await?;
    tracing::info!(request_id, requester = request.requester_id, recipient = request.recipient_id, "friend request accepted");

    Ok(FriendRequest {
        status: FriendRequestStatus::Accepted,
        ..request
    })
}

/// Reject a pending request: recipient-only; no friendship row is created.
pub async fn reject(pool: &PgPool, recipient_id: i64, request_id: i64) -> Result<FriendRequest> {
    let mut tx = pool.begin().await?;

    let request = repo::friend_requests::get_by_id_for_update(&mut *tx, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("friend request not found".to_string()))?;

    if request.recipient_id != recipient_id {
        return Err(AppError::Forbidden(
            "only the recipient can reject a friend request".to_string(),
        ));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(AppError::Conflict(format!(
            "friend request is already {}",
            request.status.as_str()
        )));
    }

    repo::friend_requests::update_status(&mut *tx, request_id, FriendRequestStatus::Rejected)
        .await?;
    tx.commit().await?;

    Ok(FriendRequest {
        status: FriendRequestStatus::Rejected,
        ..request
    })
}

/// Pending requests addressed to the user, enriched with requester profiles.
pub async fn list_pending(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<FriendRequestWithRequester>> {
    let requests = repo::friend_requests::list_pending_for(pool, user_id).await?;

    let mut enriched = Vec::with_capacity(requests.len());
    for request in requests {
        let Some(requester) = repo::users::get_basic_info(pool, request.requester_id).await? else {
            tracing::warn!(
                request_id = request.id,
                requester_id = request.requester_id,
                "pending request from missing user, skipping"
            );
            continue;
        };
        enriched.push(FriendRequestWithRequester { request, requester });
    }
    Ok(enriched)
}

pub async fn list_friends(pool: &PgPool, user_id: i64) -> Result<Vec<UserBasicInfo>> {
    let ids = repo::friendships::friend_ids_of(pool, user_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    repo::users::get_many_basic_info(pool, &ids).await
}
