//! Connection hub
//!
//! One task owns the `user_id -> connection` map; every read and mutation of
//! the map happens on that task, fed by channels. The hub never awaits
//! socket I/O: sends into per-connection buffers are non-blocking, and a
//! full buffer evicts the connection (slow-consumer eviction) so one stuck
//! client cannot head-of-line block delivery to the rest.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::wire::OutboundEnvelope;

/// Outbound send buffer capacity per connection.
pub const SEND_BUFFER_CAPACITY: usize = 256;

/// Hub-side handle to one connection: the identity of the socket plus the
/// sending half of its buffered outbound channel. Dropping the sender closes
/// the channel, which the writer pump observes as end-of-stream.
#[derive(Debug, Clone)]
pub struct Connection {
    pub user_id: i64,
    pub connection_id: Uuid,
    pub sender: mpsc::Sender<String>,
}

enum Command {
    Register(Connection),
    Unregister { user_id: i64, connection_id: Uuid },
    Broadcast(String),
    Direct(OutboundEnvelope),
}

/// Cloneable handle used by connection pumps and the fan-out consumer.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
}

impl HubHandle {
    pub async fn register(&self, connection: Connection) {
        let _ = self.commands.send(Command::Register(connection)).await;
    }

    pub async fn unregister(&self, user_id: i64, connection_id: Uuid) {
        let _ = self
            .commands
            .send(Command::Unregister {
                user_id,
                connection_id,
            })
            .await;
    }

    /// System announcement to every connected client.
    pub async fn broadcast(&self, frame: String) {
        let _ = self.commands.send(Command::Broadcast(frame)).await;
    }

    /// Hand an outbound envelope to the hub for direct delivery. Non-blocking
    /// so the fan-out consumer is never stalled by the hub; a saturated hub
    /// queue drops the envelope (the log redelivers on restart).
    pub fn deliver_direct(&self, envelope: OutboundEnvelope) {
        if let Err(e) = self.commands.try_send(Command::Direct(envelope)) {
            tracing::warn!(error = %e, "hub command queue full, dropping outbound envelope");
        }
    }
}

pub struct Hub {
    commands: mpsc::Receiver<Command>,
    clients: HashMap<i64, Connection>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(SEND_BUFFER_CAPACITY);
        (
            Self {
                commands: rx,
                clients: HashMap::new(),
            },
            HubHandle { commands: tx },
        )
    }

    /// Central loop. Runs until the shutdown signal flips or every handle is
    /// dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("hub started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        tracing::info!(connections = self.clients.len(), "hub stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register(connection) => {
                if let Some(previous) = self.clients.remove(&connection.user_id) {
                    tracing::info!(
                        user_id = connection.user_id,
                        "user already connected, evicting previous connection"
                    );
                    drop(previous); // closes the old send buffer
                }
                tracing::debug!(user_id = connection.user_id, "connection registered");
                self.clients.insert(connection.user_id, connection);
            }
            Command::Unregister {
                user_id,
                connection_id,
            } => {
                // Remove only if the stored connection is the unregistering
                // one; a late unregister from a replaced socket must not tear
                // down its successor.
                let matches = self
                    .clients
                    .get(&user_id)
                    .map(|c| c.connection_id == connection_id)
                    .unwrap_or(false);
                if matches {
                    self.clients.remove(&user_id);
                    tracing::debug!(user_id, "connection unregistered");
                } else {
                    tracing::debug!(user_id, "stale unregister ignored");
                }
            }
            Command::Broadcast(frame) => {
                let mut evicted = Vec::new();
                for (user_id, connection) in &self.clients {
                    if connection.sender.try_send(frame.clone()).is_err() {
                        evicted.push(*user_id);
                    }
                }
                for user_id in evicted {
                    tracing::warn!(user_id, "send buffer full during broadcast, evicting");
                    self.clients.remove(&user_id);
                }
            }
            Command::Direct(envelope) => {
                let receiver_id: i64 = match envelope.receiver_id.parse() {
                    Ok(id) => id,
                    Err(_) => {
                        tracing::warn!(
                            receiver_id = %envelope.receiver_id,
                            "outbound envelope with unparseable receiver id"
                        );
                        return;
                    }
                };

                let Some(connection) = self.clients.get(&receiver_id) else {
                    // Recipient not connected to this instance.
                    return;
                };

                let frame = match serde_json::to_string(&envelope) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound envelope");
                        return;
                    }
                };

                if connection.sender.try_send(frame).is_err() {
                    tracing::warn!(
                        user_id = receiver_id,
                        "send buffer full or closed, evicting slow consumer"
                    );
                    self.clients.remove(&receiver_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use chrono::Utc;
    use tokio::sync::mpsc::error::TryRecvError;

    fn envelope_for(receiver: &str) -> OutboundEnvelope {
        OutboundEnvelope {
            id: "1".to_string(),
            kind: MessageKind::Text,
            content: "hi".to_string(),
            sender_id: "7".to_string(),
            receiver_id: receiver.to_string(),
            conversation_id: "3".to_string(),
            timestamp: Utc::now(),
            file_name: None,
            file_size: None,
        }
    }

    fn connection(user_id: i64, capacity: usize) -> (Connection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Connection {
                user_id,
                connection_id: Uuid::new_v4(),
                sender: tx,
            },
            rx,
        )
    }

    async fn spawn_hub() -> (HubHandle, watch::Sender<bool>) {
        let (hub, handle) = Hub::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(hub.run(shutdown_rx));
        (handle, shutdown_tx)
    }

    #[tokio::test]
    async fn direct_delivery_reaches_registered_connection() {
        let (handle, _shutdown) = spawn_hub().await;
        let (conn, mut rx) = connection(9, 4);
        handle.register(conn).await;

        handle.deliver_direct(envelope_for("9"));

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timely delivery")
            .expect("frame");
        assert!(frame.contains("\"receiverId\":\"9\""));
    }

    #[tokio::test]
    async fn delivery_to_unconnected_user_is_dropped() {
        let (handle, _shutdown) = spawn_hub().await;
        let (conn, mut rx) = connection(9, 4);
        handle.register(conn).await;

        handle.deliver_direct(envelope_for("12"));

        // Nothing arrives for user 9.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn replacement_connection_closes_predecessor() {
        let (handle, _shutdown) = spawn_hub().await;
        let (first, mut first_rx) = connection(7, 4);
        let (second, mut second_rx) = connection(7, 4);
        let first_id = first.connection_id;

        handle.register(first).await;
        handle.register(second).await;

        // The first connection's buffer is closed by the replacement.
        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), first_rx.recv())
            .await
            .expect("channel should close promptly");
        assert!(closed.is_none());

        // Outbound traffic lands on the replacement.
        handle.deliver_direct(envelope_for("7"));
        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), second_rx.recv())
            .await
            .expect("timely delivery")
            .expect("frame");
        assert!(frame.contains("\"receiverId\":\"7\""));

        // A late unregister from the replaced connection must not remove the
        // replacement.
        handle.unregister(7, first_id).await;
        handle.deliver_direct(envelope_for("7"));
        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), second_rx.recv())
            .await
            .expect("timely delivery")
            .expect("frame");
        assert!(frame.contains("\"content\":\"hi\""));
    }

    #[tokio::test]
    async fn matching_unregister_removes_connection() {
        let (handle, _shutdown) = spawn_hub().await;
        let (conn, mut rx) = connection(7, 4);
        let connection_id = conn.connection_id;
        handle.register(conn).await;

        handle.unregister(7, connection_id).await;

        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("channel should close promptly");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_without_affecting_others() {
        let (handle, _shutdown) = spawn_hub().await;
        // Saturated buffer of one frame.
        let (slow, mut slow_rx) = connection(9, 1);
        let (healthy, mut healthy_rx) = connection(12, 4);
        handle.register(slow).await;
        handle.register(healthy).await;

        // First frame fills the slow buffer, second triggers eviction.
        handle.deliver_direct(envelope_for("9"));
        handle.deliver_direct(envelope_for("9"));
        // Delivery to the healthy client still works afterwards.
        handle.deliver_direct(envelope_for("12"));

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), healthy_rx.recv())
            .await
            .expect("timely delivery")
            .expect("frame");
        assert!(frame.contains("\"receiverId\":\"12\""));

        // The slow client's channel is closed after draining the one
        // buffered frame.
        let first = slow_rx.recv().await;
        assert!(first.is_some());
        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), slow_rx.recv())
            .await
            .expect("channel should close promptly");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let (handle, _shutdown) = spawn_hub().await;
        let (a, mut a_rx) = connection(1, 4);
        let (b, mut b_rx) = connection(2, 4);
        handle.register(a).await;
        handle.register(b).await;

        handle.broadcast("{\"type\":\"system\"}".to_string()).await;

        for rx in [&mut a_rx, &mut b_rx] {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
                .await
                .expect("timely delivery")
                .expect("frame");
            assert!(frame.contains("system"));
        }
    }
}
