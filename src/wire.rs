//! Wire envelopes
//!
//! JSON shapes exchanged with clients over the socket and between processes
//! through the log topics. All ids travel as strings on the wire; the server
//! parses them where it needs numeric ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MessageKind;

/// Frame a client sends over the socket. `senderId` is never trusted from the
/// client; the gateway stamps the authenticated user id and its own clock
/// before anything downstream sees the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// May be empty when the frame addresses an existing conversation.
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

/// Record published to the inbound topic, keyed by `senderId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

impl InboundRecord {
    /// Stamp a client frame with the authoritative sender and server time.
    pub fn from_client(envelope: ClientEnvelope, sender_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: envelope.id,
            kind: envelope.kind,
            content: envelope.content,
            sender_id: sender_id.to_string(),
            receiver_id: envelope.receiver_id,
            conversation_id: envelope.conversation_id,
            timestamp: now,
            file_name: envelope.file_name,
            file_size: envelope.file_size,
        }
    }
}

/// Record published to the outbound topic (one per recipient, keyed by
/// `receiverId`) and delivered verbatim to the recipient's socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

/// Event published to the friend-request topic, keyed by
/// `"{requester}-{recipient}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestEvent {
    pub requester_user_id: i64,
    pub recipient_user_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl FriendRequestEvent {
    pub fn key(&self) -> String {
        format!("{}-{}", self.requester_user_id, self.recipient_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_envelope_parses_minimal_frame() {
        let json = r#"{"type":"text","content":"hi","receiverId":"9"}"#;
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.kind, MessageKind::Text);
        assert_eq!(envelope.receiver_id, "9");
        assert!(envelope.id.is_none());
        assert!(envelope.conversation_id.is_none());
    }

    #[test]
    fn conversation_addressed_frame_needs_no_receiver() {
        let json = r#"{"type":"text","content":"hello","conversationId":"42"}"#;
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.receiver_id.is_empty());
        assert_eq!(envelope.conversation_id.as_deref(), Some("42"));
    }

    #[test]
    fn inbound_record_overwrites_sender_and_timestamp() {
        let envelope: ClientEnvelope = serde_json::from_str(
            r#"{"id":"c-1","type":"file","content":"...","receiverId":"9","fileName":"a.pdf","fileSize":1024}"#,
        )
        .unwrap();
        let now = Utc::now();
        let record = InboundRecord::from_client(envelope, 7, now);
        assert_eq!(record.sender_id, "7");
        assert_eq!(record.timestamp, now);
        assert_eq!(record.file_name.as_deref(), Some("a.pdf"));
        assert_eq!(record.id.as_deref(), Some("c-1"));
    }

    #[test]
    fn outbound_envelope_uses_camel_case_keys() {
        let envelope = OutboundEnvelope {
            id: "12".to_string(),
            kind: MessageKind::Text,
            content: "hello".to_string(),
            sender_id: "7".to_string(),
            receiver_id: "9".to_string(),
            conversation_id: "3".to_string(),
            timestamp: Utc::now(),
            file_name: None,
            file_size: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"senderId\":\"7\""));
        assert!(json.contains("\"conversationId\":\"3\""));
        assert!(json.contains("\"type\":\"text\""));
        assert!(!json.contains("fileName"));
    }

    #[test]
    fn friend_request_event_key_shape() {
        let event = FriendRequestEvent {
            requester_user_id: 4,
            recipient_user_id: 5,
            timestamp: Utc::now(),
        };
        assert_eq!(event.key(), "4-5");
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let json = r#"{"type":"carrier-pigeon","content":"hi","receiverId":"9"}"#;
        assert!(serde_json::from_str::<ClientEnvelope>(json).is_err());
    }
}
