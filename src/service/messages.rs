//! Message pipeline
//!
//! Two halves of the delivery fabric. [`InboundSubmitter`] is the gateway's
//! producer side: a stamped client record goes onto the inbound topic keyed
//! by sender, preserving per-sender order. [`MessagePipeline`] is the
//! consumer side: validate, persist, advance the conversation tail, and emit
//! one outbound record per recipient keyed by that recipient.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;

use crate::bus::Publisher;
use crate::error::{AppError, Result};
use crate::models::{Conversation, ConversationKind, Message};
use crate::repo;
use crate::service::conversations;
use crate::wire::{InboundRecord, OutboundEnvelope};

/// Producer half used by the gateway reader pumps.
#[derive(Clone)]
pub struct InboundSubmitter {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl InboundSubmitter {
    pub fn new(publisher: Arc<dyn Publisher>, topic: String) -> Self {
        Self { publisher, topic }
    }

    pub async fn submit(&self, record: &InboundRecord) -> Result<()> {
        if record.sender_id.is_empty() {
            return Err(AppError::Input("sender is required".to_string()));
        }
        if record.receiver_id.is_empty() && record.conversation_id.is_none() {
            return Err(AppError::Input(
                "receiver or conversation is required".to_string(),
            ));
        }
        let payload = serde_json::to_vec(record)
            .map_err(|e| AppError::Internal(format!("serializing inbound record: {e}")))?;
        self.publisher
            .publish(&self.topic, record.sender_id.as_bytes(), &payload)
            .await
    }
}

/// Consumer half: drives one inbound record through persist + fan-out.
pub struct MessagePipeline {
    pool: PgPool,
    publisher: Arc<dyn Publisher>,
    outbound_topic: String,
}

impl MessagePipeline {
    pub fn new(pool: PgPool, publisher: Arc<dyn Publisher>, outbound_topic: String) -> Self {
        Self {
            pool,
            publisher,
            outbound_topic,
        }
    }

    /// Entry point for the consumer driver. Returns `Ok` for anything that
    /// must not be retried (success or permanently bad input) and `Err` only
    /// for transient failures, which leave the offset uncommitted.
    pub async fn process(&self, payload: &[u8]) -> Result<()> {
        let record: InboundRecord = match serde_json::from_slice(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable inbound record");
                return Ok(());
            }
        };

        match self.handle(record).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "rejecting inbound record");
                Ok(())
            }
        }
    }

    async fn handle(&self, record: InboundRecord) -> Result<()> {
        let sender_id: i64 = record
            .sender_id
            .parse()
            .map_err(|_| AppError::Input(format!("bad sender id '{}'", record.sender_id)))?;

        if !repo::users::exists(&self.pool, sender_id).await? {
            return Err(AppError::NotFound(format!("sender {sender_id} not found")));
        }

        let conversation = self.resolve_target(&record, sender_id).await?;

        let message = self.persist(&record, &conversation, sender_id).await?;

        let recipients = fanout_recipients(
            conversation.kind,
            sender_id,
            record.receiver_id.parse().ok(),
            &repo::conversations::participants_of(&self.pool, conversation.id)
                .await?
                .iter()
                .map(|p| p.user_id)
                .collect::<Vec<_>>(),
        );

        let envelope = build_outbound(&message, &record);
        for recipient in recipients {
            let mut outbound = envelope.clone();
            outbound.receiver_id = recipient.to_string();
            let payload = serde_json::to_vec(&outbound)
                .map_err(|e| AppError::Internal(format!("serializing outbound: {e}")))?;
            // One slow or failing recipient must not block the rest.
            if let Err(e) = self
                .publisher
                .publish(&self.outbound_topic, outbound.receiver_id.as_bytes(), &payload)
                .await
            {
                tracing::error!(
                    recipient,
                    message_id = message.id,
                    error = %e,
                    "outbound fan-out failed for recipient"
                );
            }
        }
        Ok(())
    }

    /// Addressed conversation: explicit id (must be a participant) or the
    /// private conversation with the receiver, created on demand.
    async fn resolve_target(
        &self,
        record: &InboundRecord,
        sender_id: i64,
    ) -> Result<Conversation> {
        if let Some(conversation_id) = &record.conversation_id {
            let conversation_id: i64 = conversation_id.parse().map_err(|_| {
                AppError::Input(format!("bad conversation id '{conversation_id}'"))
            })?;
            let conversation = repo::conversations::get_by_id(&self.pool, conversation_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("conversation {conversation_id} not found"))
                })?;
            repo::conversations::get_participant(&self.pool, conversation_id, sender_id)
                .await?
                .ok_or_else(|| {
                    AppError::Forbidden(format!(
                        "sender {sender_id} is not a participant of conversation {conversation_id}"
                    ))
                })?;
            return Ok(conversation);
        }

        let receiver_id: i64 = record
            .receiver_id
            .parse()
            .map_err(|_| AppError::Input(format!("bad receiver id '{}'", record.receiver_id)))?;
        if !repo::users::exists(&self.pool, receiver_id).await? {
            return Err(AppError::NotFound(format!("receiver {receiver_id} not found")));
        }
        conversations::resolve_private(&self.pool, sender_id, receiver_id).await
    }

    /// Create the message row and advance the conversation tail in one
    /// transactional scope.
    async fn persist(
        &self,
        record: &InboundRecord,
        conversation: &Conversation,
        sender_id: i64,
    ) -> Result<Message> {
        let metadata = if record.kind.carries_file_metadata() {
            Some(json!({
                "fileName": record.file_name.clone().unwrap_or_default(),
                "fileSize": record.file_size.unwrap_or(0),
            }))
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;
        let message = repo::messages::insert(
            &mut *tx,
            conversation.id,
            sender_id,
            record.kind,
            &record.content,
            metadata.as_ref(),
            record.id.as_deref(),
            record.timestamp,
        )
        .await?;
        repo::conversations::set_last_message(&mut *tx, conversation.id, message.id).await?;
        tx.commit().await?;
        Ok(message)
    }
}

/// The outbound envelope mirrors the stored message; file details are lifted
/// from the persisted metadata.
fn build_outbound(message: &Message, record: &InboundRecord) -> OutboundEnvelope {
    let file_metadata = message.file_metadata();
    OutboundEnvelope {
        id: message.id.to_string(),
        kind: message.kind,
        content: message.content.clone(),
        sender_id: message.sender_id.to_string(),
        receiver_id: record.receiver_id.clone(),
        conversation_id: message.conversation_id.to_string(),
        timestamp: message.sent_at,
        file_name: file_metadata.as_ref().map(|m| m.file_name.clone()),
        file_size: file_metadata.as_ref().map(|m| m.file_size),
    }
}

/// Which user ids receive an outbound record for this message.
///
/// Private: the addressed receiver (or the other participant when the record
/// was addressed by conversation id). Group: every participant except the
/// sender.
pub fn fanout_recipients(
    kind: ConversationKind,
    sender_id: i64,
    explicit_receiver: Option<i64>,
    participants: &[i64],
) -> Vec<i64> {
    match kind {
        ConversationKind::Private => match explicit_receiver {
            Some(receiver) if receiver != sender_id => vec![receiver],
            _ => participants
                .iter()
                .copied()
                .filter(|&id| id != sender_id)
                .collect(),
        },
        ConversationKind::Group => participants
            .iter()
            .copied()
            .filter(|&id| id != sender_id)
            .collect(),
    }
}

/// Paged read of a conversation's messages with a participant check.
pub async fn messages_for_conversation(
    pool: &PgPool,
    conversation_id: i64,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>> {
    conversations::get_for_user(pool, conversation_id, user_id).await?;
    repo::messages::list_for_conversation(pool, conversation_id, limit, offset).await
}
