//! Conversation repository
//!
//! Holds the two-join private-conversation lookup and the participant
//! primitives the resolver builds on. The `FOR UPDATE` variant locks the
//! matched conversation row so concurrent resolvers serialize on it.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::error::Result;
use crate::models::{Conversation, ConversationKind, ConversationParticipant};
use crate::repo::decode_enum;

const COLUMNS: &str = "id, kind, target_id, last_message_id, created_at, updated_at, deleted_at";

fn row_to_conversation(row: &PgRow) -> std::result::Result<Conversation, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(Conversation {
        id: row.try_get("id")?,
        kind: decode_enum("kind", &kind, ConversationKind::from_str)?,
        target_id: row.try_get("target_id")?,
        last_message_id: row.try_get("last_message_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

pub async fn create(
    ex: impl PgExecutor<'_>,
    kind: ConversationKind,
    target_id: Option<i64>,
) -> Result<Conversation> {
    let row = sqlx::query(&format!(
        "INSERT INTO conversations (kind, target_id) VALUES ($1, $2) RETURNING {COLUMNS}"
    ))
    .bind(kind.as_str())
    .bind(target_id)
    .fetch_one(ex)
    .await?;
    Ok(row_to_conversation(&row)?)
}

pub async fn get_by_id(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<Conversation>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM conversations WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_conversation).transpose()?)
}

/// Find the private conversation whose participant set is exactly the given
/// pair. Two joins against the participant table, one per user.
pub async fn find_private_between(
    ex: impl PgExecutor<'_>,
    user_lo: i64,
    user_hi: i64,
) -> Result<Option<Conversation>> {
    let row = sqlx::query(
        "SELECT c.id, c.kind, c.target_id, c.last_message_id, c.created_at, c.updated_at, c.deleted_at \
         FROM conversations c \
         JOIN conversation_participants p1 ON c.id = p1.conversation_id AND p1.user_id = $1 \
         JOIN conversation_participants p2 ON c.id = p2.conversation_id AND p2.user_id = $2 \
         WHERE c.kind = 'private' AND c.deleted_at IS NULL",
    )
    .bind(user_lo)
    .bind(user_hi)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_conversation).transpose()?)
}

/// Same lookup with a row lock on the conversation, for use inside the
/// resolver's transaction.
pub async fn find_private_between_for_update(
    ex: impl PgExecutor<'_>,
    user_lo: i64,
    user_hi: i64,
) -> Result<Option<Conversation>> {
    let row = sqlx::query(
        "SELECT c.id, c.kind, c.target_id, c.last_message_id, c.created_at, c.updated_at, c.deleted_at \
         FROM conversations c \
         JOIN conversation_participants p1 ON c.id = p1.conversation_id AND p1.user_id = $1 \
         JOIN conversation_participants p2 ON c.id = p2.conversation_id AND p2.user_id = $2 \
         WHERE c.kind = 'private' AND c.deleted_at IS NULL \
         FOR UPDATE OF c",
    )
    .bind(user_lo)
    .bind(user_hi)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_conversation).transpose()?)
}

pub async fn find_group_conversation(
    ex: impl PgExecutor<'_>,
    group_id: i64,
) -> Result<Option<Conversation>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM conversations \
         WHERE kind = 'group' AND target_id = $1 AND deleted_at IS NULL"
    ))
    .bind(group_id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_conversation).transpose()?)
}

/// Conversations the user participates in, most recently updated first.
pub async fn list_for_user(
    ex: impl PgExecutor<'_>,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Conversation>> {
    let rows = sqlx::query(
        "SELECT c.id, c.kind, c.target_id, c.last_message_id, c.created_at, c.updated_at, c.deleted_at \
         FROM conversations c \
         JOIN conversation_participants p ON p.conversation_id = c.id \
         WHERE p.user_id = $1 AND c.deleted_at IS NULL \
         ORDER BY c.updated_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(ex)
    .await?;
    let conversations = rows
        .iter()
        .map(row_to_conversation)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(conversations)
}

/// Insert a participant, tolerating a concurrent creator having won the race.
pub async fn add_participant(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    user_id: i64,
    is_admin: bool,
    joined_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO conversation_participants (conversation_id, user_id, is_admin, joined_at) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (conversation_id, user_id) DO NOTHING",
    )
    .bind(conversation_id)
    .bind(user_id)
    .bind(is_admin)
    .bind(joined_at)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn get_participant(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    user_id: i64,
) -> Result<Option<ConversationParticipant>> {
    let participant = sqlx::query_as::<_, ConversationParticipant>(
        "SELECT conversation_id, user_id, joined_at, last_read_at, is_admin \
         FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_optional(ex)
    .await?;
    Ok(participant)
}

pub async fn participants_of(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
) -> Result<Vec<ConversationParticipant>> {
    let participants = sqlx::query_as::<_, ConversationParticipant>(
        "SELECT conversation_id, user_id, joined_at, last_read_at, is_admin \
         FROM conversation_participants WHERE conversation_id = $1 ORDER BY user_id",
    )
    .bind(conversation_id)
    .fetch_all(ex)
    .await?;
    Ok(participants)
}

pub async fn participant_count(ex: impl PgExecutor<'_>, conversation_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_one(ex)
    .await?;
    Ok(count)
}

pub async fn remove_participant(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    user_id: i64,
) -> Result<()> {
    sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2")
        .bind(conversation_id)
        .bind(user_id)
        .execute(ex)
        .await?;
    Ok(())
}

/// Advance the conversation tail pointer; bumps `updated_at` so the
/// conversation sorts to the top of the user's list.
pub async fn set_last_message(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    message_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE conversations SET last_message_id = $2, updated_at = now() WHERE id = $1")
        .bind(conversation_id)
        .bind(message_id)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn mark_read(ex: impl PgExecutor<'_>, conversation_id: i64, user_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE conversation_participants SET last_read_at = now() \
         WHERE conversation_id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(ex)
    .await?;
    Ok(())
}
