use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message payload kind, shared by the wire envelopes and the stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Emoji,
    System,
    Audio,
    Video,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Emoji => "emoji",
            Self::System => "system",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            "emoji" => Some(Self::Emoji),
            "system" => Some(Self::System),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Kinds whose content is a blob URL with file metadata attached.
    pub fn carries_file_metadata(&self) -> bool {
        matches!(self, Self::Image | Self::File | Self::Audio | Self::Video)
    }
}

/// A persisted chat message. `content` holds the text body, or the blob URL
/// for file-like kinds; structured details live in `metadata`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub kind: MessageKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    pub delivery_state: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Structured metadata stored alongside file-like messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Message {
    pub fn file_metadata(&self) -> Option<FileMetadata> {
        self.metadata
            .as_ref()
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_serde() {
        for kind in [
            MessageKind::Text,
            MessageKind::Image,
            MessageKind::File,
            MessageKind::Emoji,
            MessageKind::System,
            MessageKind::Audio,
            MessageKind::Video,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: MessageKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
            assert_eq!(MessageKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_string_is_rejected() {
        assert_eq!(MessageKind::from_str("carrier-pigeon"), None);
    }

    #[test]
    fn file_kinds_carry_metadata() {
        assert!(MessageKind::File.carries_file_metadata());
        assert!(MessageKind::Image.carries_file_metadata());
        assert!(!MessageKind::Text.carries_file_metadata());
        assert!(!MessageKind::Emoji.carries_file_metadata());
    }

    #[test]
    fn metadata_deserializes_into_file_details() {
        let message = Message {
            id: 1,
            conversation_id: 2,
            sender_id: 3,
            kind: MessageKind::File,
            content: "/uploads/abc.pdf".to_string(),
            metadata: Some(serde_json::json!({"fileName": "report.pdf", "fileSize": 2048})),
            client_id: None,
            delivery_state: "sent".to_string(),
            sent_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let details = message.file_metadata().unwrap();
        assert_eq!(details.file_name, "report.pdf");
        assert_eq!(details.file_size, 2048);
    }
}
