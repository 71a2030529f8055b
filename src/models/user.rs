use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account. The password hash is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nickname: String,
    pub avatar_url: String,
    pub bio: String,
    pub presence: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Minimal public view of a user, used when enriching friend requests and
/// friend lists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBasicInfo {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            password_hash: "$2b$12$secret".to_string(),
            nickname: "Alice".to_string(),
            avatar_url: String::new(),
            bio: String::new(),
            presence: "offline".to_string(),
            last_seen_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("passwordHash"));
        assert!(json.contains("\"username\":\"alice\""));
    }
}
