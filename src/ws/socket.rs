//! Connection handle and handler contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::DispatchError;
use crate::http::Identity;
use crate::routing::PathParams;

/// Inbound data frame handed to the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Outbound frame queued to a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    Close { code: u16, reason: String },
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("connection is closed")]
    Closed,
}

/// A live connection as seen by handler code: identity, extracted path
/// variables, and a way to push frames out.
pub struct Socket {
    id: String,
    path: String,
    params: PathParams,
    user: Option<Identity>,
    sender: mpsc::Sender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl Socket {
    pub(crate) fn new(
        id: String,
        path: String,
        params: PathParams,
        user: Option<Identity>,
        sender: mpsc::Sender<Outbound>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            path,
            params,
            user,
            sender,
            connected,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SocketError> {
        self.send(Outbound::Text(text.into())).await
    }

    pub async fn send_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SocketError> {
        self.send(Outbound::Binary(bytes.into())).await
    }

    pub async fn send_json(&self, value: &serde_json::Value) -> Result<(), SocketError> {
        self.send_text(value.to_string()).await
    }

    /// Ask the writer task to close the connection.
    pub async fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), SocketError> {
        let result = self
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .await;
        self.connected.store(false, Ordering::Relaxed);
        result
    }

    async fn send(&self, frame: Outbound) -> Result<(), SocketError> {
        if !self.is_connected() {
            return Err(SocketError::Closed);
        }
        self.sender
            .send(frame)
            .await
            .map_err(|_| SocketError::Closed)
    }
}

/// A WebSocket endpoint's handler.
#[async_trait]
pub trait SocketHandler: Send + Sync {
    /// Runs once the connection is registered; an error rejects and closes
    /// the connection.
    async fn on_connect(&self, socket: &Socket) -> Result<(), DispatchError> {
        let _ = socket;
        Ok(())
    }

    /// Runs for every inbound data frame.
    async fn on_message(&self, socket: &Socket, frame: Frame);

    /// Runs after the connection has left the registry.
    async fn on_disconnect(&self, socket: &Socket) {
        let _ = socket;
    }
}
