//! Group repository

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::error::Result;
use crate::models::{Group, GroupMember, GroupRole, JoinPolicy};
use crate::repo::decode_enum;

const COLUMNS: &str = "id, owner_id, name, description, avatar_url, is_public, join_policy, \
                       member_count, created_at, updated_at, deleted_at";

fn row_to_group(row: &PgRow) -> std::result::Result<Group, sqlx::Error> {
    let join_policy: String = row.try_get("join_policy")?;
    Ok(Group {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        avatar_url: row.try_get("avatar_url")?,
        is_public: row.try_get("is_public")?,
        join_policy: decode_enum("join_policy", &join_policy, JoinPolicy::from_str)?,
        member_count: row.try_get("member_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn row_to_member(row: &PgRow) -> std::result::Result<GroupMember, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(GroupMember {
        group_id: row.try_get("group_id")?,
        user_id: row.try_get("user_id")?,
        role: decode_enum("role", &role, GroupRole::from_str)?,
        alias: row.try_get("alias")?,
        joined_at: row.try_get("joined_at")?,
    })
}

pub async fn create(
    ex: impl PgExecutor<'_>,
    owner_id: i64,
    name: &str,
    description: &str,
    avatar_url: &str,
    is_public: bool,
    join_policy: JoinPolicy,
) -> Result<Group> {
    let row = sqlx::query(&format!(
        "INSERT INTO groups (owner_id, name, description, avatar_url, is_public, join_policy, member_count) \
         VALUES ($1, $2, $3, $4, $5, $6, 0) RETURNING {COLUMNS}"
    ))
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .bind(avatar_url)
    .bind(is_public)
    .bind(join_policy.as_str())
    .fetch_one(ex)
    .await?;
    Ok(row_to_group(&row)?)
}

pub async fn get_by_id(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<Group>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM groups WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_group).transpose()?)
}

pub async fn search_public(
    ex: impl PgExecutor<'_>,
    query: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Group>> {
    let pattern = format!("%{}%", query);
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM groups \
         WHERE is_public AND deleted_at IS NULL AND (name ILIKE $1 OR description ILIKE $1) \
         ORDER BY member_count DESC, name LIMIT $2 OFFSET $3"
    ))
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(ex)
    .await?;
    let groups = rows
        .iter()
        .map(row_to_group)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(groups)
}

pub async fn list_for_user(
    ex: impl PgExecutor<'_>,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Group>> {
    let rows = sqlx::query(
        "SELECT g.id, g.owner_id, g.name, g.description, g.avatar_url, g.is_public, \
                g.join_policy, g.member_count, g.created_at, g.updated_at, g.deleted_at \
         FROM groups g \
         JOIN group_members m ON m.group_id = g.id \
         WHERE m.user_id = $1 AND g.deleted_at IS NULL \
         ORDER BY g.name LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(ex)
    .await?;
    let groups = rows
        .iter()
        .map(row_to_group)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(groups)
}

/// Insert a membership; a duplicate insert is a no-op and reports whether a
/// row was actually added so callers can keep `member_count` honest.
pub async fn add_member(
    ex: impl PgExecutor<'_>,
    group_id: i64,
    user_id: i64,
    role: GroupRole,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3) \
         ON CONFLICT (group_id, user_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(ex)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_member(
    ex: impl PgExecutor<'_>,
    group_id: i64,
    user_id: i64,
) -> Result<Option<GroupMember>> {
    let row = sqlx::query(
        "SELECT group_id, user_id, role, alias, joined_at FROM group_members \
         WHERE group_id = $1 AND user_id = $2",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_member).transpose()?)
}

pub async fn list_members(
    ex: impl PgExecutor<'_>,
    group_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<GroupMember>> {
    let rows = sqlx::query(
        "SELECT group_id, user_id, role, alias, joined_at FROM group_members \
         WHERE group_id = $1 ORDER BY joined_at LIMIT $2 OFFSET $3",
    )
    .bind(group_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(ex)
    .await?;
    let members = rows
        .iter()
        .map(row_to_member)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(members)
}

pub async fn remove_member(ex: impl PgExecutor<'_>, group_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_member_role(
    ex: impl PgExecutor<'_>,
    group_id: i64,
    user_id: i64,
    role: GroupRole,
) -> Result<Option<GroupMember>> {
    let row = sqlx::query(
        "UPDATE group_members SET role = $3 WHERE group_id = $1 AND user_id = $2 \
         RETURNING group_id, user_id, role, alias, joined_at",
    )
    .bind(group_id)
    .bind(user_id)
    .bind(role.as_str())
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(row_to_member).transpose()?)
}

pub async fn adjust_member_count(ex: impl PgExecutor<'_>, group_id: i64, delta: i32) -> Result<()> {
    sqlx::query(
        "UPDATE groups SET member_count = GREATEST(member_count + $2, 0), updated_at = now() \
         WHERE id = $1",
    )
    .bind(group_id)
    .bind(delta)
    .execute(ex)
    .await?;
    Ok(())
}
