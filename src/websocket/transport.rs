use crate::types::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connect-time parameters handed to the transport factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectParams {
    /// Project identifier, sent as the `project` query parameter.
    pub project: String,
    /// Comma-joined channel list, sent as the `channels` query parameter.
    pub channels: String,
    /// Transports with built-in retry must have it disabled; reconnection is
    /// owned by the connection manager.
    pub reconnection: bool,
}

/// Events surfaced by a live transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One inbound text frame.
    Message(String),
    /// The connection closed, with a human-readable reason. Always the last
    /// event a transport produces.
    Disconnected(String),
}

/// Write half of a live connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one text frame.
    async fn send(&self, text: String) -> Result<()>;

    /// Closes the connection. Idempotent.
    async fn disconnect(&self);
}

/// Opens connections to the realtime endpoint.
///
/// Returning the read half as an event stream keeps the connection manager
/// free of transport-specific types and lets tests script a connection.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)>;
}
