//! Registration and login

use sqlx::PgPool;

use crate::auth::{hash_password, issue_token, verify_password};
use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::repo;

pub async fn register(
    pool: &PgPool,
    username: &str,
    nickname: &str,
    email: Option<&str>,
    password: &str,
) -> Result<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Input(
            "username and password are required".to_string(),
        ));
    }

    if repo::users::get_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict("username already taken".to_string()));
    }
    if let Some(email) = email {
        if repo::users::get_by_email(pool, email).await?.is_some() {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
    }

    let password_hash = hash_password(password)?;
    let nickname = if nickname.trim().is_empty() {
        username
    } else {
        nickname.trim()
    };
    let user = repo::users::create(pool, username, email, &password_hash, nickname).await?;
    tracing::info!(user_id = user.id, "user registered");
    Ok(user)
}

/// Login by username or email; a valid password yields a token with a fresh
/// session id.
pub async fn login(
    pool: &PgPool,
    cfg: &AuthConfig,
    username_or_email: &str,
    password: &str,
) -> Result<(String, User)> {
    let user = match repo::users::get_by_username(pool, username_or_email).await? {
        Some(user) => user,
        None => repo::users::get_by_email(pool, username_or_email)
            .await?
            .ok_or(AppError::Unauthorized)?,
    };

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(user.id, &user.username, cfg)?;
    Ok((token, user))
}
