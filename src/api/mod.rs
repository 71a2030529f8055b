//! HTTP API server
//!
//! Out-of-band surface: auth, profiles, conversations, groups, friend
//! requests, uploads. Real-time traffic never passes through here; the send
//! path for friend requests is the only producer this process runs.

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::RevocationStore;
use crate::bus::Publisher;
use crate::config::AppConfig;
use crate::service::groups::RecentCreates;
use crate::storage::BlobStore;

#[derive(Clone)]
pub struct ApiState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub publisher: Arc<dyn Publisher>,
    pub revocation: RevocationStore,
    pub blob_store: Arc<dyn BlobStore>,
    pub recent_creates: Arc<RecentCreates>,
}
