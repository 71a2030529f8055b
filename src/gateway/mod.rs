//! Chat gateway
//!
//! Owns the persistent client sockets. The hub routes in-memory; per-
//! connection pumps translate frames to inbound log records and deliver
//! outbound envelopes.

pub mod client;
pub mod hub;
pub mod ws;

use crate::auth::RevocationStore;
use crate::config::{AuthConfig, WebSocketConfig};
use crate::service::messages::InboundSubmitter;

pub use hub::{Hub, HubHandle};

/// Shared state for the gateway's axum router.
#[derive(Clone)]
pub struct GatewayState {
    pub hub: HubHandle,
    pub submitter: InboundSubmitter,
    pub auth: AuthConfig,
    pub revocation: RevocationStore,
    pub web_socket: WebSocketConfig,
}
