//! User repository

use sqlx::PgExecutor;

use crate::error::Result;
use crate::models::{User, UserBasicInfo};

const COLUMNS: &str = "id, username, email, password_hash, nickname, avatar_url, bio, presence, \
                       last_seen_at, created_at, updated_at, deleted_at";

pub async fn create(
    ex: impl PgExecutor<'_>,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
    nickname: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash, nickname) \
         VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(nickname)
    .fetch_one(ex)
    .await?;
    Ok(user)
}

pub async fn get_by_id(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(user)
}

pub async fn get_by_username(ex: impl PgExecutor<'_>, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL"
    ))
    .bind(username)
    .fetch_optional(ex)
    .await?;
    Ok(user)
}

pub async fn get_by_email(ex: impl PgExecutor<'_>, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
    ))
    .bind(email)
    .fetch_optional(ex)
    .await?;
    Ok(user)
}

pub async fn exists(ex: impl PgExecutor<'_>, id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_one(ex)
            .await?;
    Ok(count > 0)
}

pub async fn update_profile(
    ex: impl PgExecutor<'_>,
    id: i64,
    nickname: Option<&str>,
    avatar_url: Option<&str>,
    bio: Option<&str>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
           nickname = COALESCE($2, nickname), \
           avatar_url = COALESCE($3, avatar_url), \
           bio = COALESCE($4, bio), \
           updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(nickname)
    .bind(avatar_url)
    .bind(bio)
    .fetch_optional(ex)
    .await?;
    Ok(user)
}

/// Substring search over username and nickname, excluding the caller.
pub async fn search(
    ex: impl PgExecutor<'_>,
    query: &str,
    exclude_user_id: i64,
    limit: i64,
) -> Result<Vec<User>> {
    let pattern = format!("%{}%", query);
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users \
         WHERE (username ILIKE $1 OR nickname ILIKE $1) \
           AND id <> $2 AND deleted_at IS NULL \
         ORDER BY username LIMIT $3"
    ))
    .bind(&pattern)
    .bind(exclude_user_id)
    .bind(limit)
    .fetch_all(ex)
    .await?;
    Ok(users)
}

pub async fn get_basic_info(ex: impl PgExecutor<'_>, id: i64) -> Result<Option<UserBasicInfo>> {
    let info = sqlx::query_as::<_, UserBasicInfo>(
        "SELECT id, username, nickname, avatar_url FROM users \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(info)
}

pub async fn get_many_basic_info(
    ex: impl PgExecutor<'_>,
    ids: &[i64],
) -> Result<Vec<UserBasicInfo>> {
    let infos = sqlx::query_as::<_, UserBasicInfo>(
        "SELECT id, username, nickname, avatar_url FROM users \
         WHERE id = ANY($1) AND deleted_at IS NULL ORDER BY username",
    )
    .bind(ids)
    .fetch_all(ex)
    .await?;
    Ok(infos)
}
