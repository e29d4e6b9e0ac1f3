use crate::channel::SubscriptionRegistry;
use crate::types::ServerMessage;
use tokio::task::JoinHandle;

/// Consolidated mutable state for [`RealtimeClient`](super::RealtimeClient).
/// A single struct behind one lock keeps registry and dispatch bookkeeping
/// consistent.
pub struct ClientState {
    /// Live subscriptions and their channel set.
    pub registry: SubscriptionRegistry,

    /// Most recently parsed inbound message, of any type. The close handler
    /// reads it to decide whether a retry must be suppressed.
    pub last_message: Option<ServerMessage>,

    /// Pending debounced connect pass; replaced on every new request so only
    /// the most recent timer survives.
    pub connect_debounce: Option<JoinHandle<()>>,

    /// Pending backoff retry, if the last close scheduled one.
    pub retry_task: Option<JoinHandle<()>>,

    /// Reader loop of the current transport.
    pub read_task: Option<JoinHandle<()>>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            last_message: None,
            connect_debounce: None,
            retry_task: None,
            read_task: None,
        }
    }

    /// Aborts the reader and any pending retry. The debounce task is left
    /// alone: a teardown may be followed by a queued connect request.
    pub fn abort_connection_tasks(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
