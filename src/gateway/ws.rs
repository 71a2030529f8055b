//! WebSocket upgrade and connection admission
//!
//! The client authenticates with a `token` query parameter; a token that is
//! signature-valid but revoked is rejected just like a missing one. Only
//! after admission is the socket upgraded and handed to the pumps.

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth;
use crate::error::AppError;
use crate::gateway::client::run_connection;
use crate::gateway::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(token) = query.token else {
        return AppError::Unauthorized.into_response();
    };

    let claims = match auth::verify_token(&token, &state.auth) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    match state.revocation.is_revoked(&claims.jti).await {
        Ok(false) => {}
        Ok(true) => {
            tracing::warn!(user_id = claims.user_id, "revoked session attempted connect");
            return AppError::Unauthorized.into_response();
        }
        Err(e) => return e.into_response(),
    }

    let user_id = claims.user_id;
    let hub = state.hub.clone();
    let submitter = state.submitter.clone();
    let cfg = state.web_socket.clone();

    ws.max_message_size(cfg.max_message_size_bytes)
        .on_upgrade(move |socket| run_connection(socket, user_id, hub, submitter, cfg))
}
