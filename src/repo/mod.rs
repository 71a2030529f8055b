//! Repositories
//!
//! Typed read/write access to the relational store. Functions take any
//! `PgExecutor` so the same query runs against the pool or inside an open
//! transaction; multi-row invariant changes (participant seeding, friendship
//! acceptance) are composed inside `pool.begin()` scopes by the service
//! layer.

pub mod conversations;
pub mod friend_requests;
pub mod friendships;
pub mod groups;
pub mod messages;
pub mod users;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Decode a stored enum string, surfacing unknown values as a column decode
/// error instead of silently defaulting.
pub(crate) fn decode_enum<T>(
    column: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> std::result::Result<T, sqlx::Error> {
    parse(raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unrecognized value '{raw}'").into(),
    })
}

/// Connect to the database and run pending migrations.
pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&cfg.url())
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("migration failed: {e}")))?;

    Ok(pool)
}
