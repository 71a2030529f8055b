//! Message repository

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::error::Result;
use crate::models::{Message, MessageKind};
use crate::repo::decode_enum;

const COLUMNS: &str = "id, conversation_id, sender_id, kind, content, metadata, client_id, \
                       delivery_state, sent_at, created_at, updated_at, deleted_at";

fn row_to_message(row: &PgRow) -> std::result::Result<Message, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        kind: decode_enum("kind", &kind, MessageKind::from_str)?,
        content: row.try_get("content")?,
        metadata: row.try_get("metadata")?,
        client_id: row.try_get("client_id")?,
        delivery_state: row.try_get("delivery_state")?,
        sent_at: row.try_get("sent_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Insert a message. When the sender supplied a client id and a row with the
/// same `(sender_id, client_id)` already exists (a pipeline retry), the
/// existing row is returned instead of inserting a duplicate.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    sender_id: i64,
    kind: MessageKind,
    content: &str,
    metadata: Option<&serde_json::Value>,
    client_id: Option<&str>,
    sent_at: DateTime<Utc>,
) -> Result<Message> {
    let row = sqlx::query(&format!(
        "WITH inserted AS ( \
            INSERT INTO messages (conversation_id, sender_id, kind, content, metadata, client_id, sent_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) \
            ON CONFLICT (sender_id, client_id) WHERE client_id IS NOT NULL DO NOTHING \
            RETURNING {COLUMNS} \
         ) \
         SELECT {COLUMNS} FROM inserted \
         UNION ALL \
         SELECT {COLUMNS} FROM messages WHERE sender_id = $2 AND client_id = $6 AND $6 IS NOT NULL \
         LIMIT 1"
    ))
    .bind(conversation_id)
    .bind(sender_id)
    .bind(kind.as_str())
    .bind(content)
    .bind(metadata)
    .bind(client_id)
    .bind(sent_at)
    .fetch_one(ex)
    .await?;
    Ok(row_to_message(&row)?)
}

pub async fn get_by_id(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<Message>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM messages WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_message).transpose()?)
}

/// Page through a conversation's messages, newest first.
pub async fn list_for_conversation(
    ex: impl PgExecutor<'_>,
    conversation_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM messages \
         WHERE conversation_id = $1 AND deleted_at IS NULL \
         ORDER BY sent_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(conversation_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(ex)
    .await?;
    let messages = rows
        .iter()
        .map(row_to_message)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}
