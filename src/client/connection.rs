use crate::types::{error::Result, ClientMessage, RealtimeError};
use crate::websocket::Transport;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; the channel set is empty or nothing was requested yet.
    Idle,
    Connecting,
    Open,
    /// Waiting out the retry delay after an unexpected close.
    Backoff,
}

/// Exclusive owner of the live transport and the reconnect bookkeeping.
///
/// At most one transport is held at a time. The reconnect flag and attempt
/// counter are only ever written here and from the client's close handler.
pub struct ConnectionManager {
    transport: RwLock<Option<Arc<dyn Transport>>>,
    /// Endpoint the current/last transport was opened against; compared with
    /// the configured endpoint to detect changes that force a full reconnect.
    bound_url: RwLock<Option<String>>,
    state: RwLock<ConnectionState>,
    /// Whether an unexpected close should schedule a retry. Disarmed before
    /// an intentional teardown, re-armed when the close is observed.
    reconnect: AtomicBool,
    attempts: AtomicU32,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            transport: RwLock::new(None),
            bound_url: RwLock::new(None),
            state: RwLock::new(ConnectionState::Idle),
            reconnect: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    pub async fn is_open(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    pub async fn has_transport(&self) -> bool {
        self.transport.read().await.is_some()
    }

    pub async fn bound_url(&self) -> Option<String> {
        self.bound_url.read().await.clone()
    }

    pub async fn set_bound_url(&self, url: Option<String>) {
        *self.bound_url.write().await = url;
    }

    /// Installs a freshly connected transport: the attempt counter resets and
    /// auto-reconnect is armed for this connection.
    pub async fn adopt(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().await = Some(transport);
        self.attempts.store(0, Ordering::SeqCst);
        self.reconnect.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Open;
    }

    /// Forgets the transport without closing it (it is already gone).
    pub async fn clear_transport(&self) {
        *self.transport.write().await = None;
    }

    /// Closes and releases the transport, returning to idle.
    pub async fn teardown(&self) {
        let transport = self.transport.write().await.take();
        if let Some(transport) = transport {
            transport.disconnect().await;
        }
        *self.state.write().await = ConnectionState::Idle;
    }

    /// Serializes and sends a message over the live transport.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        let transport = self.transport.read().await.as_ref().map(Arc::clone);
        let Some(transport) = transport else {
            return Err(RealtimeError::NotConnected);
        };
        let text = serde_json::to_string(message)?;
        transport.send(text).await
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }

    pub fn set_reconnect(&self, enabled: bool) {
        self.reconnect.store(enabled, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn increment_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
