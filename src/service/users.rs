//! User service

use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::repo;

pub async fn get_profile(pool: &PgPool, user_id: i64) -> Result<User> {
    repo::users::get_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    nickname: Option<&str>,
    avatar_url: Option<&str>,
    bio: Option<&str>,
) -> Result<User> {
    repo::users::update_profile(pool, user_id, nickname, avatar_url, bio)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
}

pub async fn search(pool: &PgPool, query: &str, current_user_id: i64) -> Result<Vec<User>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    repo::users::search(pool, query, current_user_id, 20).await
}
