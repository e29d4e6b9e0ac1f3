use crate::client::{ClientState, ConnectionManager};
use crate::infrastructure::{session_key, SessionStore};
use crate::types::{ClientMessage, ConnectedPayload, RealtimeEvent, ServerMessage};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Routes inbound messages: records them, upgrades anonymous connections,
/// and fans events out to matching subscriptions.
///
/// Nothing a message does — parse failure, a panicking callback, a server
/// error — ever propagates out of [`route`](Self::route); the read loop must
/// survive every inbound frame.
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
    connection: Arc<ConnectionManager>,
    sessions: Arc<dyn SessionStore>,
    project: String,
}

impl MessageRouter {
    pub fn new(
        state: Arc<RwLock<ClientState>>,
        connection: Arc<ConnectionManager>,
        sessions: Arc<dyn SessionStore>,
        project: String,
    ) -> Self {
        Self {
            state,
            connection,
            sessions,
            project,
        }
    }

    /// Parses one inbound frame and routes it by message type.
    pub async fn route(&self, raw: &str) {
        let message: ServerMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("discarding malformed realtime message: {}", e);
                return;
            }
        };

        // Recorded before any handling: the close handler runs later and may
        // need this message even if the socket closes because of it.
        self.state.write().await.last_message = Some(message.clone());

        match message {
            ServerMessage::Connected(payload) => self.handle_connected(payload).await,
            ServerMessage::Event(event) => self.handle_event(event).await,
            ServerMessage::Error(error) => {
                tracing::error!("realtime server error {}: {}", error.code, error.message);
            }
            ServerMessage::Unknown => {
                tracing::debug!("ignoring unknown realtime message type");
            }
        }
    }

    /// On `connected`: if the server resolved no identity but a fallback
    /// session token is persisted for this project, upgrade the connection
    /// in place with an authentication message.
    async fn handle_connected(&self, payload: ConnectedPayload) {
        tracing::info!(
            "realtime connected, server accepted channels: {:?}",
            payload.channels
        );

        if payload.user.is_some() {
            return;
        }
        let Some(session) = self.sessions.get(&session_key(&self.project)) else {
            return;
        };

        let message = ClientMessage::Authentication { session };
        if let Err(e) = self.connection.send(&message).await {
            tracing::error!("failed to send authentication message: {}", e);
        }
    }

    async fn handle_event(&self, event: RealtimeEvent) {
        let callbacks = {
            let state = self.state.read().await;
            // Stale fan-in guard: the server may still send for channels we
            // already dropped (race between unsubscribe and server update).
            if !state.registry.is_listening(&event.channels) {
                tracing::debug!(
                    "dropping event for channels no longer subscribed: {:?}",
                    event.channels
                );
                return;
            }
            state.registry.matching_callbacks(&event.channels)
        };

        // Fire-and-forget: each callback runs on its own task so a slow or
        // panicking subscriber cannot stall dispatch of later messages.
        for callback in callbacks {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_string());
                    tracing::error!("subscription callback panicked: {}", detail);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemorySessionStore;
    use crate::types::ErrorPayload;

    fn router(state: Arc<RwLock<ClientState>>) -> MessageRouter {
        MessageRouter::new(
            state,
            Arc::new(ConnectionManager::new()),
            Arc::new(MemorySessionStore::new()),
            "p1".to_string(),
        )
    }

    #[tokio::test]
    async fn records_last_message_for_any_type() {
        let state = Arc::new(RwLock::new(ClientState::new()));
        let router = router(Arc::clone(&state));

        router
            .route(r#"{"type":"error","data":{"code":1008,"message":"denied"}}"#)
            .await;

        let last = state.read().await.last_message.clone();
        assert_eq!(
            last,
            Some(ServerMessage::Error(ErrorPayload {
                code: 1008,
                message: "denied".to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn malformed_message_is_swallowed() {
        let state = Arc::new(RwLock::new(ClientState::new()));
        let router = router(Arc::clone(&state));

        router.route("not json at all").await;

        assert!(state.read().await.last_message.is_none());
    }

    #[tokio::test]
    async fn event_for_unsubscribed_channels_is_dropped() {
        let state = Arc::new(RwLock::new(ClientState::new()));
        let invoked = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let invoked = Arc::clone(&invoked);
            state.write().await.registry.add(
                vec!["documents".to_string()],
                Arc::new(move |_| {
                    invoked.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }),
            );
        }

        let router = router(Arc::clone(&state));
        router
            .route(
                r#"{"type":"event","data":{"events":["files.create"],"channels":["files"],"timestamp":1,"payload":{}}}"#,
            )
            .await;
        tokio::task::yield_now().await;

        assert_eq!(invoked.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
