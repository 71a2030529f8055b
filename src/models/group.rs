use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How users may enter a group. Only `DirectJoin` admits members today;
/// the other policies reject join attempts until an approval workflow lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    DirectJoin,
    ApprovalRequired,
    InviteOnly,
}

impl JoinPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectJoin => "direct_join",
            Self::ApprovalRequired => "approval_required",
            Self::InviteOnly => "invite_only",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "direct_join" => Some(Self::DirectJoin),
            "approval_required" => Some(Self::ApprovalRequired),
            "invite_only" => Some(Self::InviteOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// A chat group. Each group owns exactly one group-type conversation whose
/// `target_id` equals the group id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: String,
    pub avatar_url: String,
    pub is_public: bool,
    pub join_policy: JoinPolicy,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: i64,
    pub user_id: i64,
    pub role: GroupRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    /// Whether this membership maps to the participant admin flag.
    pub fn is_admin(&self) -> bool {
        self.role == GroupRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_policy_string_round_trip() {
        for policy in [
            JoinPolicy::DirectJoin,
            JoinPolicy::ApprovalRequired,
            JoinPolicy::InviteOnly,
        ] {
            assert_eq!(JoinPolicy::from_str(policy.as_str()), Some(policy));
        }
        assert_eq!(JoinPolicy::from_str("walk_in"), None);
    }

    #[test]
    fn admin_flag_mirrors_role() {
        let member = GroupMember {
            group_id: 1,
            user_id: 2,
            role: GroupRole::Admin,
            alias: None,
            joined_at: Utc::now(),
        };
        assert!(member.is_admin());
    }
}
