//! Per-connection pumps
//!
//! Each accepted socket gets two cooperating tasks. The reader decodes
//! client frames, stamps the authenticated sender and server time, and hands
//! the record to the inbound submitter. The writer drains the bounded send
//! buffer (coalescing whatever is queued into a single write) and emits
//! periodic pings. Either side failing tears down only this connection.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::gateway::hub::{Connection, HubHandle, SEND_BUFFER_CAPACITY};
use crate::service::messages::InboundSubmitter;
use crate::wire::{ClientEnvelope, InboundRecord};

/// Drive one authenticated connection to completion.
pub async fn run_connection(
    socket: WebSocket,
    user_id: i64,
    hub: HubHandle,
    submitter: InboundSubmitter,
    cfg: WebSocketConfig,
) {
    let connection_id = Uuid::new_v4();
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(SEND_BUFFER_CAPACITY);

    hub.register(Connection {
        user_id,
        connection_id,
        sender: tx,
    })
    .await;
    tracing::info!(user_id, %connection_id, "client connected");

    let writer = tokio::spawn(write_pump(sink, rx, cfg.clone()));

    read_pump(stream, user_id, &submitter, &cfg).await;

    // Reader finished: drop our registration (identity-checked, so a
    // replacement connection is left alone) and let the writer wind down.
    hub.unregister(user_id, connection_id).await;
    writer.abort();
    tracing::info!(user_id, %connection_id, "client disconnected");
}

/// Read frames until error, close, or pong deadline. Pings from the peer are
/// answered by the socket layer; any pong resets the read deadline.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    user_id: i64,
    submitter: &InboundSubmitter,
    cfg: &WebSocketConfig,
) {
    loop {
        let frame = match tokio::time::timeout(cfg.pong_wait(), stream.next()).await {
            Err(_) => {
                tracing::warn!(user_id, "pong deadline exceeded, closing connection");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                tracing::debug!(user_id, error = %e, "socket read error");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return,
            // Pong resets the deadline by reaching the next loop iteration;
            // pings are auto-answered; binary frames are not part of the
            // protocol.
            WsMessage::Pong(_) | WsMessage::Ping(_) => continue,
            WsMessage::Binary(_) => {
                tracing::warn!(user_id, "ignoring binary frame");
                continue;
            }
        };

        let envelope: ClientEnvelope = match serde_json::from_str(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "dropping undecodable client frame");
                continue;
            }
        };

        let record = InboundRecord::from_client(envelope, user_id, chrono::Utc::now());
        // A failing inbound producer is logged and the frame dropped; the
        // connection itself stays up.
        if let Err(e) = submitter.submit(&record).await {
            tracing::error!(user_id, error = %e, "failed to enqueue inbound message");
        }
    }
}

/// Drain the send buffer into the socket, coalescing queued frames into one
/// newline-joined write, and ping on a period strictly below the pong wait.
async fn write_pump(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<String>,
    cfg: WebSocketConfig,
) {
    let mut ping = tokio::time::interval(cfg.ping_period());
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(mut frame) = frame else {
                    // Buffer closed: evicted or unregistered. Say goodbye.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return;
                };
                // Coalesce whatever else is already queued.
                while let Ok(next) = rx.try_recv() {
                    frame.push('\n');
                    frame.push_str(&next);
                }
                let write = sink.send(WsMessage::Text(frame.into()));
                match tokio::time::timeout(cfg.write_wait(), write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "socket write error");
                        return;
                    }
                    Err(_) => {
                        tracing::warn!("socket write deadline exceeded");
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                let write = sink.send(WsMessage::Ping(Vec::new().into()));
                match tokio::time::timeout(cfg.write_wait(), write).await {
                    Ok(Ok(())) => {}
                    _ => return,
                }
            }
        }
    }
}
