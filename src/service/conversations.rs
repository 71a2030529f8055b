//! Conversation resolver
//!
//! Produces *the* conversation for an addressing mode, creating it if
//! absent. Concurrent resolvers for the same target serialize on a
//! transaction-scoped advisory lock, so exactly one creator wins and the
//! losers see the created row; participant inserts additionally tolerate
//! duplicates.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, Result};
use crate::models::{
    canonical_pair, Conversation, ConversationKind, ConversationParticipant, Message,
    UserBasicInfo,
};
use crate::repo;

/// Serialize resolvers working on the same logical target.
async fn advisory_lock(conn: &mut PgConnection, scope: &str, a: i64, b: i64) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2 || ':' || $3, 0))")
        .bind(scope)
        .bind(a)
        .bind(b)
        .execute(conn)
        .await?;
    Ok(())
}

/// Find or create the unique private conversation for an unordered user
/// pair.
pub async fn resolve_private(pool: &PgPool, user_a: i64, user_b: i64) -> Result<Conversation> {
    if user_a == user_b {
        return Err(AppError::Input(
            "cannot open a private conversation with yourself".to_string(),
        ));
    }
    let (lo, hi) = canonical_pair(user_a, user_b);

    let mut tx = pool.begin().await?;
    advisory_lock(&mut tx, "private-conversation", lo, hi).await?;

    if let Some(existing) =
        repo::conversations::find_private_between_for_update(&mut *tx, lo, hi).await?
    {
        tx.commit().await?;
        return Ok(existing);
    }

    let conversation =
        repo::conversations::create(&mut *tx, ConversationKind::Private, None).await?;
    let now = Utc::now();
    repo::conversations::add_participant(&mut *tx, conversation.id, lo, false, now).await?;
    repo::conversations::add_participant(&mut *tx, conversation.id, hi, false, now).await?;
    tx.commit().await?;

    tracing::info!(
        conversation_id = conversation.id,
        user_lo = lo,
        user_hi = hi,
        "private conversation created"
    );
    Ok(conversation)
}

/// Find or create the unique group conversation for a group, seeding the
/// owner (admin) and the supplied member ids. Non-existent users are
/// skipped; duplicates collapse. Everything happens in one transaction, so a
/// partial failure rolls the creation back.
pub async fn resolve_group(
    pool: &PgPool,
    group_id: i64,
    owner_id: i64,
    member_ids: &[i64],
) -> Result<Conversation> {
    let mut tx = pool.begin().await?;
    advisory_lock(&mut tx, "group-conversation", group_id, 0).await?;

    if let Some(existing) = repo::conversations::find_group_conversation(&mut *tx, group_id).await? {
        tx.commit().await?;
        return Ok(existing);
    }

    let conversation =
        repo::conversations::create(&mut *tx, ConversationKind::Group, Some(group_id)).await?;
    let now = Utc::now();
    repo::conversations::add_participant(&mut *tx, conversation.id, owner_id, true, now).await?;
    for &member_id in member_ids {
        if member_id == owner_id {
            continue;
        }
        if !repo::users::exists(&mut *tx, member_id).await? {
            tracing::warn!(group_id, member_id, "skipping non-existent initial member");
            continue;
        }
        repo::conversations::add_participant(&mut *tx, conversation.id, member_id, false, now)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(conversation_id = conversation.id, group_id, "group conversation created");
    Ok(conversation)
}

/// Re-seed a group conversation's participants from the current member rows,
/// removing strays, so the participant set equals the member set. The admin
/// flag mirrors the member role.
pub async fn repair_group_participants(pool: &PgPool, group_id: i64) -> Result<usize> {
    let mut tx = pool.begin().await?;
    advisory_lock(&mut tx, "group-conversation", group_id, 0).await?;

    let conversation = repo::conversations::find_group_conversation(&mut *tx, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("group conversation not found".to_string()))?;

    let before = repo::conversations::participant_count(&mut *tx, conversation.id).await?;
    let members = repo::groups::list_members(&mut *tx, group_id, i64::MAX, 0).await?;
    let now = Utc::now();
    let mut seeded = 0usize;
    for member in &members {
        repo::conversations::add_participant(
            &mut *tx,
            conversation.id,
            member.user_id,
            member.is_admin(),
            now,
        )
        .await?;
        seeded += 1;
    }

    let member_ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
    let participants = repo::conversations::participants_of(&mut *tx, conversation.id).await?;
    for participant in participants {
        if !member_ids.contains(&participant.user_id) {
            repo::conversations::remove_participant(&mut *tx, conversation.id, participant.user_id)
                .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(
        group_id,
        conversation_id = conversation.id,
        before,
        seeded,
        "group participants repaired"
    );
    Ok(seeded)
}

/// Load a conversation the user is allowed to see; *forbidden* when the user
/// is not a participant.
pub async fn get_for_user(
    pool: &PgPool,
    conversation_id: i64,
    user_id: i64,
) -> Result<Conversation> {
    let conversation = repo::conversations::get_by_id(pool, conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))?;

    repo::conversations::get_participant(pool, conversation_id, user_id)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden("not a participant of this conversation".to_string())
        })?;

    Ok(conversation)
}

pub async fn participants(
    pool: &PgPool,
    conversation_id: i64,
) -> Result<Vec<ConversationParticipant>> {
    repo::conversations::participants_of(pool, conversation_id).await
}

/// Enriched list item for the conversation list endpoint.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i64>,
    pub last_message: Option<LastMessagePreview>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessagePreview {
    pub id: i64,
    pub content: String,
    pub sender_id: String,
    pub timestamp: chrono::DateTime<Utc>,
}

impl LastMessagePreview {
    fn from_message(message: &Message) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            sender_id: message.sender_id.to_string(),
            timestamp: message.sent_at,
        }
    }
}

/// List the user's conversations, resolving the counterpart (private) or the
/// group (group) plus the last message preview.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ConversationSummary>> {
    let conversations = repo::conversations::list_for_user(pool, user_id, limit, offset).await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let mut summary = ConversationSummary {
            id: conversation.id,
            kind: conversation.kind,
            target_id: conversation.target_id,
            name: None,
            username: None,
            avatar: None,
            member_count: None,
            last_message: None,
            updated_at: conversation.updated_at,
        };

        match conversation.kind {
            ConversationKind::Private => {
                let participants =
                    repo::conversations::participants_of(pool, conversation.id).await?;
                if let Some(other) = participants.iter().find(|p| p.user_id != user_id) {
                    summary.target_id = Some(other.user_id);
                    if let Some(info) = peer_info(pool, other.user_id).await? {
                        summary.name = Some(info.nickname);
                        summary.username = Some(info.username);
                        summary.avatar = Some(info.avatar_url);
                    }
                }
            }
            ConversationKind::Group => {
                if let Some(group_id) = conversation.target_id {
                    if let Some(group) = repo::groups::get_by_id(pool, group_id).await? {
                        summary.name = Some(group.name);
                        summary.avatar = Some(group.avatar_url);
                        summary.member_count = Some(group.member_count as i64);
                    }
                }
            }
        }

        if let Some(last_message_id) = conversation.last_message_id {
            if let Some(message) = repo::messages::get_by_id(pool, last_message_id).await? {
                summary.last_message = Some(LastMessagePreview::from_message(&message));
            }
        }

        summaries.push(summary);
    }
    Ok(summaries)
}

async fn peer_info(pool: &PgPool, user_id: i64) -> Result<Option<UserBasicInfo>> {
    repo::users::get_basic_info(pool, user_id).await
}
