//! Live connection registry.
//!
//! # Responsibilities
//! - Track connections by a collision-checked generated identifier
//! - Direct send, registry-wide broadcast, and shutdown close
//! - Drive each connection's listen loop
//!
//! # Design Decisions
//! - Register/deregister go through the map's entry API, so the two cannot
//!   interleave on the same key
//! - Broadcast snapshots the channel ends before awaiting; shard locks are
//!   never held across a suspension point

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::http::Identity;
use crate::observability::metrics;
use crate::routing::PathParams;
use crate::ws::socket::{Frame, Outbound, Socket, SocketError, SocketHandler};

/// Per-connection outbound queue depth.
const SEND_BUFFER: usize = 64;

struct Registered {
    sender: mpsc::Sender<Outbound>,
    connected: Arc<AtomicBool>,
}

/// Registry of live WebSocket connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Registered>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a connection under a fresh identifier and return it.
    pub fn register(
        &self,
        sender: mpsc::Sender<Outbound>,
        connected: Arc<AtomicBool>,
    ) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            match self.connections.entry(id.clone()) {
                dashmap::Entry::Vacant(slot) => {
                    slot.insert(Registered {
                        sender: sender.clone(),
                        connected: connected.clone(),
                    });
                    metrics::socket_connected();
                    tracing::debug!(connection_id = %id, "WebSocket connection registered");
                    return id;
                }
                // Identifier already taken: re-roll.
                dashmap::Entry::Occupied(_) => continue,
            }
        }
    }

    /// Remove a connection. Safe to call for an id that already left.
    pub fn deregister(&self, id: &str) -> bool {
        match self.connections.remove(id) {
            Some((_, registered)) => {
                registered.connected.store(false, Ordering::Relaxed);
                metrics::socket_disconnected();
                tracing::debug!(connection_id = %id, "WebSocket connection deregistered");
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Queue a frame to one connection.
    pub async fn send(&self, id: &str, frame: Outbound) -> Result<(), SocketError> {
        let sender = self
            .connections
            .get(id)
            .map(|registered| registered.sender.clone())
            .ok_or_else(|| SocketError::UnknownConnection(id.to_string()))?;
        sender.send(frame).await.map_err(|_| SocketError::Closed)
    }

    /// Queue a frame to every connection the predicate admits; returns how
    /// many deliveries succeeded.
    pub async fn broadcast(
        &self,
        frame: Outbound,
        predicate: Option<&(dyn Fn(&str) -> bool + Sync)>,
    ) -> usize {
        let targets: Vec<mpsc::Sender<Outbound>> = self
            .connections
            .iter()
            .filter(|entry| predicate.map(|keep| keep(entry.key())).unwrap_or(true))
            .map(|entry| entry.value().sender.clone())
            .collect();

        let mut delivered = 0;
        for sender in targets {
            if sender.send(frame.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Ask every live connection to close (graceful shutdown path).
    pub async fn close_all(&self, code: u16, reason: &str) {
        let count = self
            .broadcast(
                Outbound::Close {
                    code,
                    reason: reason.to_string(),
                },
                None,
            )
            .await;
        if count > 0 {
            tracing::info!(connections = count, "Closing WebSocket connections");
        }
    }

    /// Run one accepted connection to completion: register it, pump frames
    /// to the handler, deregister on disconnect.
    pub async fn serve(
        &self,
        transport: WebSocket,
        handler: Arc<dyn SocketHandler>,
        path: String,
        params: PathParams,
        user: Option<Identity>,
    ) {
        let (mut sink, mut stream) = transport.split();
        let (tx, mut rx) = mpsc::channel::<Outbound>(SEND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));
        let id = self.register(tx.clone(), connected.clone());

        let writer_connected = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let message = match frame {
                    Outbound::Text(text) => Message::Text(text.into()),
                    Outbound::Binary(bytes) => Message::Binary(bytes.into()),
                    Outbound::Close { code, reason } => {
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: reason.into(),
                            })))
                            .await;
                        break;
                    }
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            writer_connected.store(false, Ordering::Relaxed);
        });

        let socket = Socket::new(id.clone(), path, params, user, tx, connected);

        match handler.on_connect(&socket).await {
            Ok(()) => {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            handler
                                .on_message(&socket, Frame::Text(text.as_str().to_string()))
                                .await;
                        }
                        Ok(Message::Binary(bytes)) => {
                            handler
                                .on_message(&socket, Frame::Binary(bytes.to_vec()))
                                .await;
                        }
                        // Control frames never reach the handler.
                        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                        Ok(Message::Close(_)) | Err(_) => break,
                    }
                }
            }
            Err(err) => {
                tracing::debug!(connection_id = %socket.id(), error = %err, "Connection rejected at connect");
                let _ = socket.close(1008, "rejected").await;
            }
        }

        self.deregister(&id);
        handler.on_disconnect(&socket).await;
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dummy_connection() -> (mpsc::Sender<Outbound>, mpsc::Receiver<Outbound>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(8);
        (tx, rx, Arc::new(AtomicBool::new(true)))
    }

    #[tokio::test]
    async fn test_identifiers_are_unique() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let (tx, rx, connected) = dummy_connection();
            receivers.push(rx);
            ids.insert(registry.register(tx, connected));
        }
        assert_eq!(ids.len(), 1000);
        assert_eq!(registry.count(), 1000);

        let victim = ids.iter().next().unwrap().clone();
        assert!(registry.deregister(&victim));
        assert_eq!(registry.count(), 999);
        assert!(!registry.contains(&victim));
    }

    #[tokio::test]
    async fn test_deregister_is_safe_to_repeat() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx, connected) = dummy_connection();
        let id = registry.register(tx, connected.clone());

        assert!(registry.deregister(&id));
        assert!(!registry.deregister(&id));
        assert!(!connected.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_direct_send() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx, connected) = dummy_connection();
        let id = registry.register(tx, connected);

        registry
            .send(&id, Outbound::Text("hello".into()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), Outbound::Text("hello".into()));

        let err = registry
            .send("missing", Outbound::Text("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SocketError::UnknownConnection(_)));
    }

    #[tokio::test]
    async fn test_broadcast_with_predicate() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a, conn_a) = dummy_connection();
        let (tx_b, mut rx_b, conn_b) = dummy_connection();
        let id_a = registry.register(tx_a, conn_a);
        let _id_b = registry.register(tx_b, conn_b);

        let all = registry.broadcast(Outbound::Text("everyone".into()), None).await;
        assert_eq!(all, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());

        let keep = move |id: &str| id == id_a;
        let some = registry
            .broadcast(
                Outbound::Text("just a".into()),
                Some(&keep as &(dyn Fn(&str) -> bool + Sync)),
            )
            .await;
        assert_eq!(some, 1);
        assert_eq!(rx_a.recv().await.unwrap(), Outbound::Text("just a".into()));
        assert!(rx_b.try_recv().is_err());
    }
}
