//! Friendship repository
//!
//! Rows store the canonical pair (`user_lo < user_hi`); callers pass any
//! order and the queries canonicalize with LEAST/GREATEST.

use sqlx::PgExecutor;

use crate::error::Result;
use crate::models::Friendship;

pub async fn are_friends(ex: impl PgExecutor<'_>, user_a: i64, user_b: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM friendships \
         WHERE user_lo = LEAST($1, $2) AND user_hi = GREATEST($1, $2) AND deleted_at IS NULL",
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_one(ex)
    .await?;
    Ok(count > 0)
}

/// Insert the canonicalized pair; a concurrent duplicate is a no-op.
pub async fn insert(ex: impl PgExecutor<'_>, user_a: i64, user_b: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO friendships (user_lo, user_hi) \
         VALUES (LEAST($1, $2), GREATEST($1, $2)) \
         ON CONFLICT DO NOTHING",
    )
    .bind(user_a)
    .bind(user_b)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn get_between(
    ex: impl PgExecutor<'_>,
    user_a: i64,
    user_b: i64,
) -> Result<Option<Friendship>> {
    let friendship = sqlx::query_as::<_, Friendship>(
        "SELECT id, user_lo, user_hi, created_at FROM friendships \
         WHERE user_lo = LEAST($1, $2) AND user_hi = GREATEST($1, $2) AND deleted_at IS NULL",
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(ex)
    .await?;
    Ok(friendship)
}

/// Ids of all friends of the user, whichever side of the pair they sit on.
pub async fn friend_ids_of(ex: impl PgExecutor<'_>, user_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT CASE WHEN user_lo = $1 THEN user_hi ELSE user_lo END \
         FROM friendships WHERE (user_lo = $1 OR user_hi = $1) AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_all(ex)
    .await?;
    Ok(ids)
}
