use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserBasicInfo;

/// Friend request lifecycle:
/// pending -> accepted | rejected | cancelled, all terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: i64,
    pub requester_id: i64,
    pub recipient_id: i64,
    pub status: FriendRequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending request enriched with the requester's public profile, the shape
/// returned by the list-pending endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestWithRequester {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub requester: UserBasicInfo,
}

/// Symmetric friend relation stored once per pair with `user_lo < user_hi`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: i64,
    pub user_lo: i64,
    pub user_hi: i64,
    pub created_at: DateTime<Utc>,
}

/// Canonicalize an unordered user pair so `lo < hi`.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_orders_both_ways() {
        assert_eq!(canonical_pair(4, 5), (4, 5));
        assert_eq!(canonical_pair(5, 4), (4, 5));
        assert_eq!(canonical_pair(7, 7), (7, 7));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!FriendRequestStatus::Pending.is_terminal());
        assert!(FriendRequestStatus::Accepted.is_terminal());
        assert!(FriendRequestStatus::Rejected.is_terminal());
        assert!(FriendRequestStatus::Cancelled.is_terminal());
    }
}
