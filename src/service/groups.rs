//! Group service
//!
//! Group CRUD and membership, plus the associated group conversation. Only
//! `direct_join` groups admit members through the join endpoint; the other
//! policies refuse until an approval workflow exists.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::{Conversation, Group, GroupMember, GroupRole, JoinPolicy};
use crate::repo;
use crate::service::conversations;

/// Short-window duplicate guard for group creation. Double-submitted create
/// requests (same owner, name and member set) answer 429 instead of making a
/// second group.
pub struct RecentCreates {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl RecentCreates {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// True when the key was already seen inside the window. Records the key
    /// either way.
    pub fn is_duplicate(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().expect("recent-creates lock poisoned");
        seen.retain(|_, at| now.duration_since(*at) < self.window);
        match seen.get(key) {
            Some(_) => true,
            None => {
                seen.insert(key.to_string(), now);
                false
            }
        }
    }
}

impl Default for RecentCreates {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

pub fn create_request_key(owner_id: i64, name: &str, member_ids: &[i64]) -> String {
    let mut ids = member_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    format!("create_group:{owner_id}:{name}:{ids:?}")
}

/// Create a group, seed the owner as admin plus the valid initial members,
/// and create the associated group conversation.
pub async fn create_group(
    pool: &PgPool,
    owner_id: i64,
    name: &str,
    description: &str,
    avatar_url: &str,
    is_public: bool,
    join_policy: JoinPolicy,
    member_ids: &[i64],
) -> Result<(Group, Conversation)> {
    if name.trim().is_empty() {
        return Err(AppError::Input("group name must not be empty".to_string()));
    }

    let mut tx = pool.begin().await?;
    let group = repo::groups::create(
        &mut *tx,
        owner_id,
        name.trim(),
        description,
        avatar_url,
        is_public,
        join_policy,
    )
    .await?;

    repo::groups::add_member(&mut *tx, group.id, owner_id, GroupRole::Admin).await?;
    let mut member_count = 1;
    for &member_id in member_ids {
        if member_id == owner_id || member_id <= 0 {
            continue;
        }
        if !repo::users::exists(&mut *tx, member_id).await? {
            tracing::warn!(group_id = group.id, member_id, "skipping non-existent member");
            continue;
        }
        if repo::groups::add_member(&mut *tx, group.id, member_id, GroupRole::Member).await? {
            member_count += 1;
        }
    }
    repo::groups::adjust_member_count(&mut *tx, group.id, member_count).await?;
    tx.commit().await?;

    // Seed the conversation from the actual membership.
    let members: Vec<i64> = repo::groups::list_members(pool, group.id, i64::MAX, 0)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    let conversation = conversations::resolve_group(pool, group.id, owner_id, &members).await?;

    let group = repo::groups::get_by_id(pool, group.id)
        .await?
        .ok_or_else(|| AppError::Internal("group vanished after creation".to_string()))?;

    tracing::info!(group_id = group.id, owner_id, members = group.member_count, "group created");
    Ok((group, conversation))
}

pub async fn get_group(pool: &PgPool, group_id: i64) -> Result<Group> {
    repo::groups::get_by_id(pool, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group {group_id} not found")))
}

pub async fn search_public(
    pool: &PgPool,
    query: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Group>> {
    repo::groups::search_public(pool, query, limit, offset).await
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Group>> {
    repo::groups::list_for_user(pool, user_id, limit, offset).await
}

/// Join a group. Only `direct_join` admits; other policies are refused
/// rather than silently accepted.
pub async fn join(pool: &PgPool, user_id: i64, group_id: i64) -> Result<GroupMember> {
    let group = get_group(pool, group_id).await?;

    if repo::groups::get_member(pool, group_id, user_id).await?.is_some() {
        return Err(AppError::Conflict("already a member of this group".to_string()));
    }

    if group.join_policy != JoinPolicy::DirectJoin {
        return Err(AppError::Forbidden(format!(
            "group requires '{}' to join",
            group.join_policy.as_str()
        )));
    }

    let mut tx = pool.begin().await?;
    let added = repo::groups::add_member(&mut *tx, group_id, user_id, GroupRole::Member).await?;
    if added {
        repo::groups::adjust_member_count(&mut *tx, group_id, 1).await?;
    }
    tx.commit().await?;

    // Membership extends to the group conversation.
    if let Some(conversation) = repo::conversations::find_group_conversation(pool, group_id).await?
    {
        repo::conversations::add_participant(
            pool,
            conversation.id,
            user_id,
            false,
            chrono::Utc::now(),
        )
        .await?;
    }

    repo::groups::get_member(pool, group_id, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("membership vanished after join".to_string()))
}

/// Leave a group. The owner must hand the group over first while other
/// members remain.
pub async fn leave(pool: &PgPool, user_id: i64, group_id: i64) -> Result<()> {
    let group = get_group(pool, group_id).await?;

    repo::groups::get_member(pool, group_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("not a member of this group".to_string()))?;

    if group.owner_id == user_id && group.member_count > 1 {
        return Err(AppError::Conflict(
            "owner must transfer ownership before leaving".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    if repo::groups::remove_member(&mut *tx, group_id, user_id).await? {
        repo::groups::adjust_member_count(&mut *tx, group_id, -1).await?;
    }
    tx.commit().await?;

    if let Some(conversation) = repo::conversations::find_group_conversation(pool, group_id).await?
    {
        repo::conversations::remove_participant(pool, conversation.id, user_id).await?;
    }
    Ok(())
}

pub async fn members(
    pool: &PgPool,
    group_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<GroupMember>> {
    get_group(pool, group_id).await?;
    repo::groups::list_members(pool, group_id, limit, offset).await
}

/// Change a member's role; only group admins may do this.
pub async fn update_member_role(
    pool: &PgPool,
    acting_user_id: i64,
    group_id: i64,
    member_id: i64,
    role: GroupRole,
) -> Result<GroupMember> {
    let acting = repo::groups::get_member(pool, group_id, acting_user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("not a member of this group".to_string()))?;
    if acting.role != GroupRole::Admin {
        return Err(AppError::Forbidden("only group admins can change roles".to_string()));
    }

    repo::groups::update_member_role(pool, group_id, member_id, role)
        .await?
        .ok_or_else(|| AppError::NotFound("member not found in this group".to_string()))
}

/// Admin check for the repair endpoint.
pub async fn require_admin(pool: &PgPool, group_id: i64, user_id: i64) -> Result<()> {
    let member = repo::groups::get_member(pool, group_id, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("not a member of this group".to_string()))?;
    if member.role != GroupRole::Admin {
        return Err(AppError::Forbidden("group admin required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_create_is_flagged_inside_window() {
        let guard = RecentCreates::new(Duration::from_secs(60));
        let key = create_request_key(1, "rustaceans", &[2, 3]);
        assert!(!guard.is_duplicate(&key));
        assert!(guard.is_duplicate(&key));
    }

    #[test]
    fn different_member_sets_are_distinct_requests() {
        let guard = RecentCreates::new(Duration::from_secs(60));
        assert!(!guard.is_duplicate(&create_request_key(1, "rustaceans", &[2, 3])));
        assert!(!guard.is_duplicate(&create_request_key(1, "rustaceans", &[2, 4])));
    }

    #[test]
    fn key_is_order_insensitive_over_members() {
        assert_eq!(
            create_request_key(1, "g", &[3, 2, 3]),
            create_request_key(1, "g", &[2, 3])
        );
    }

    #[test]
    fn entries_expire_after_window() {
        let guard = RecentCreates::new(Duration::from_millis(1));
        let key = create_request_key(1, "g", &[]);
        assert!(!guard.is_duplicate(&key));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!guard.is_duplicate(&key));
    }
}
