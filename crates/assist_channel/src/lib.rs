//! Minimal transport-neutral contract for the persistent suggestion stream.
//!
//! This crate defines only how a text-frame channel is opened, used, and
//! released. It excludes frame encoding, connection-state bookkeeping, and
//! reconnect scheduling, which belong to the session layer.

mod ws;

use async_trait::async_trait;
use thiserror::Error;

pub use ws::{WsChannel, WsConnector};

/// Failure of the underlying streaming transport.
///
/// Transport failures are recoverable: the session layer reacts to them by
/// scheduling a reconnect, never by surfacing them to the user directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("channel closed")]
    Closed,
}

impl TransportError {
    /// Returns true when the failure happened before a channel existed.
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::InvalidEndpoint(_) | Self::Connect(_))
    }
}

/// Opens new channels to one fixed endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Human-readable endpoint used in diagnostics.
    fn endpoint(&self) -> String;

    /// Establishes a fresh channel. Each call is one connect attempt.
    async fn connect(&self) -> Result<Box<dyn Channel>, TransportError>;
}

/// One open bidirectional text-frame channel.
///
/// `recv_text` must be cancel-safe: the session layer polls it inside
/// `tokio::select!` alongside outbound traffic.
#[async_trait]
pub trait Channel: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `None` means the peer closed the channel cleanly.
    async fn recv_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Releases the channel. Errors while closing are not reported.
    async fn close(&mut self);
}
