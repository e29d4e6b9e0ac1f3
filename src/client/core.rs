use super::{ClientState, ConnectionManager, ConnectionState, RealtimeClientBuilder, RealtimeConfig};
use crate::channel::{Channels, Subscription};
use crate::infrastructure::{retry_delay, SessionStore};
use crate::messaging::MessageRouter;
use crate::types::{
    RealtimeEvent, Result, ServerMessage, CONNECT_DEBOUNCE_MS, POLICY_VIOLATION_CODE,
};
use crate::websocket::{ConnectParams, TransportEvent, TransportFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Realtime multiplexer client.
///
/// Maintains one persistent connection to the realtime endpoint and
/// multiplexes any number of logical subscriptions over it. The connection
/// follows the channel set: it is opened once the first subscription appears,
/// reopened with backoff after unexpected closes, and torn down when the last
/// subscription goes away.
///
/// # Example
///
/// ```no_run
/// use nuvix_realtime::{RealtimeClient, RealtimeConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(RealtimeConfig::new(
///     "https://api.nuvix.in/v1",
///     "my-project",
/// ))?;
///
/// let subscription = client
///     .subscribe(["documents", "files"], |event| {
///         println!("{:?} on {:?}", event.events, event.channels);
///     })
///     .await;
///
/// // ... later
/// subscription.unsubscribe().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) config: Arc<RwLock<RealtimeConfig>>,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) state: Arc<RwLock<ClientState>>,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) sessions: Arc<dyn SessionStore>,
}

impl RealtimeClient {
    /// Creates a client with the default WebSocket transport and an empty
    /// in-memory session store. Use [`RealtimeClientBuilder`] to wire in
    /// custom collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`](crate::RealtimeError::Config) if the
    /// configuration is missing a project id.
    pub fn new(config: RealtimeConfig) -> Result<Self> {
        RealtimeClientBuilder::new(config).map(|builder| builder.build())
    }

    /// Registers a callback for events on one or more channels.
    ///
    /// Returns immediately; connection establishment happens in the
    /// background and its failures are retried internally, never surfaced
    /// here. The returned [`Subscription`] is the only way to remove the
    /// registration.
    pub async fn subscribe<F>(&self, channels: impl Into<Channels>, callback: F) -> Subscription
    where
        F: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        let channels = channels.into().into_vec();
        let id = {
            let mut state = self.state.write().await;
            state.registry.add(channels, Arc::new(callback))
        };

        self.request_connect().await;

        Subscription {
            client: self.clone(),
            id,
        }
    }

    pub(crate) async fn remove_subscription(&self, id: u64) {
        let removed = { self.state.write().await.registry.remove(id) };
        if removed {
            self.request_connect().await;
        }
    }

    /// Points the client at a different primary endpoint. Takes effect on the
    /// next connection pass.
    pub async fn set_endpoint(&self, endpoint: impl Into<String>) {
        self.config.write().await.endpoint = endpoint.into();
    }

    /// Overrides the realtime endpoint. Takes effect on the next connection
    /// pass; an established connection is replaced once one is triggered.
    pub async fn set_realtime_endpoint(&self, endpoint: impl Into<String>) {
        self.config.write().await.endpoint_realtime = Some(endpoint.into());
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_open().await
    }

    /// Snapshot of the advertised channel set, sorted.
    pub async fn active_channels(&self) -> Vec<String> {
        self.state.read().await.registry.channel_list()
    }

    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.registry.len()
    }

    /// Debounced ensure-connection: each call replaces the pending timer, so
    /// bursts of subscribe/unsubscribe calls collapse into one connect pass
    /// shortly after the last of them.
    async fn request_connect(&self) {
        let client = self.clone();
        let mut state = self.state.write().await;
        if let Some(pending) = state.connect_debounce.take() {
            pending.abort();
        }
        state.connect_debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(CONNECT_DEBOUNCE_MS)).await;
            client.sync_connection().await;
        }));
    }

    /// Reconciles the connection against the current channel set: tears down
    /// when the set is empty, connects when there is no live transport or the
    /// configured endpoint changed, and otherwise leaves the socket alone.
    pub(crate) fn sync_connection(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
        let channels = { self.state.read().await.registry.channel_list() };

        if channels.is_empty() {
            // Intentional teardown: disarm auto-reconnect so the resulting
            // close is not retried.
            self.connection.set_reconnect(false);
            self.connection.teardown().await;
            // May cancel the task running this pass, so nothing follows it.
            self.state.write().await.abort_connection_tasks();
            return;
        }

        let (endpoint, project) = {
            let config = self.config.read().await;
            (config.realtime_endpoint(), config.project.clone())
        };
        let url = match endpoint {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("cannot resolve realtime endpoint: {}", e);
                return;
            }
        };

        let unchanged = self.connection.bound_url().await.as_deref() == Some(url.as_str())
            && self.connection.has_transport().await;
        if unchanged {
            return;
        }

        // Replace whatever is live; the old reader must not observe its own
        // teardown as an unexpected close.
        {
            let mut state = self.state.write().await;
            if let Some(task) = state.read_task.take() {
                task.abort();
            }
        }
        self.connection.teardown().await;
        self.connection.set_bound_url(Some(url.clone())).await;
        self.connection.set_state(ConnectionState::Connecting).await;

        let params = ConnectParams {
            project,
            channels: channels.join(","),
            reconnection: false,
        };

        tracing::info!("connecting realtime transport to {}", url);
        match self.factory.connect(&url, &params).await {
            Ok((transport, events)) => {
                self.connection.adopt(transport).await;
                self.spawn_read_task(events).await;
            }
            Err(e) => {
                tracing::error!("realtime connect failed: {}", e);
                self.handle_close("connect failed").await;
            }
        }
        })
    }

    async fn spawn_read_task(&self, mut events: mpsc::Receiver<TransportEvent>) {
        let project = { self.config.read().await.project.clone() };
        let router = MessageRouter::new(
            Arc::clone(&self.state),
            Arc::clone(&self.connection),
            Arc::clone(&self.sessions),
            project,
        );
        let client = self.clone();

        let mut state = self.state.write().await;
        if let Some(previous) = state.read_task.take() {
            previous.abort();
        }
        state.read_task = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Message(text) => router.route(&text).await,
                    TransportEvent::Disconnected(reason) => {
                        client.handle_close(&reason).await;
                        break;
                    }
                }
            }
        }));
    }

    /// Close handler: decides whether the disconnect is retried.
    ///
    /// Skipped when reconnect was disarmed (intentional teardown) or when the
    /// last inbound message was a policy-violation error, so the client never
    /// storms a server that is actively rejecting it. The attempt counter is
    /// untouched on the skip paths.
    pub(crate) async fn handle_close(&self, reason: &str) {
        self.connection.clear_transport().await;
        self.connection.set_state(ConnectionState::Idle).await;

        let unauthorized = {
            let state = self.state.read().await;
            matches!(
                &state.last_message,
                Some(ServerMessage::Error(error)) if error.code == POLICY_VIOLATION_CODE
            )
        };
        if !self.connection.reconnect_enabled() || unauthorized {
            if unauthorized {
                tracing::error!("realtime closed after policy violation, not retrying");
            }
            // Re-arm so a future voluntary reconnect is not blocked.
            self.connection.set_reconnect(true);
            return;
        }

        let delay = retry_delay(self.connection.attempts());
        tracing::error!(
            "realtime disconnected, reconnecting in {}s: {}",
            delay.as_secs(),
            reason
        );
        self.connection.set_state(ConnectionState::Backoff).await;

        let client = self.clone();
        let mut state = self.state.write().await;
        if let Some(previous) = state.retry_task.take() {
            previous.abort();
        }
        state.retry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.connection.increment_attempts();
            client.sync_connection().await;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemorySessionStore;
    use crate::types::RealtimeError;
    use crate::websocket::Transport;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct MockLink {
        url: String,
        params: ConnectParams,
        sent: Arc<StdMutex<Vec<String>>>,
        disconnected: Arc<AtomicBool>,
        events: mpsc::Sender<TransportEvent>,
    }

    impl MockLink {
        async fn push(&self, raw: &str) {
            self.events
                .send(TransportEvent::Message(raw.to_string()))
                .await
                .unwrap();
            // Let the read task and any spawned callbacks run.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        async fn close(&self, reason: &str) {
            self.events
                .send(TransportEvent::Disconnected(reason.to_string()))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn is_disconnected(&self) -> bool {
            self.disconnected.load(Ordering::SeqCst)
        }
    }

    struct MockTransport {
        sent: Arc<StdMutex<Vec<String>>>,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, text: String) -> Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn disconnect(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct MockFactory {
        links: Arc<StdMutex<Vec<Arc<MockLink>>>>,
        attempts: Arc<AtomicUsize>,
        fail_next: Arc<AtomicBool>,
    }

    impl MockFactory {
        fn attempts_made(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn connects(&self) -> usize {
            self.links.lock().unwrap().len()
        }

        fn link(&self, index: usize) -> Arc<MockLink> {
            Arc::clone(&self.links.lock().unwrap()[index])
        }
    }

    #[async_trait]
    impl TransportFactory for MockFactory {
        async fn connect(
            &self,
            url: &str,
            params: &ConnectParams,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(RealtimeError::Connection("connection refused".to_string()));
            }

            let (tx, rx) = mpsc::channel(16);
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let disconnected = Arc::new(AtomicBool::new(false));
            self.links.lock().unwrap().push(Arc::new(MockLink {
                url: url.to_string(),
                params: params.clone(),
                sent: Arc::clone(&sent),
                disconnected: Arc::clone(&disconnected),
                events: tx,
            }));
            Ok((Arc::new(MockTransport { sent, disconnected }), rx))
        }
    }

    fn test_client(factory: &MockFactory, sessions: Arc<MemorySessionStore>) -> RealtimeClient {
        RealtimeClientBuilder::new(RealtimeConfig::new("https://api.test/v1", "p1"))
            .unwrap()
            .transport_factory(Arc::new(factory.clone()))
            .session_store(sessions)
            .build()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(CONNECT_DEBOUNCE_MS * 2)).await;
    }

    fn event_json(channels: &[&str]) -> String {
        serde_json::to_string(&serde_json::json!({
            "type": "event",
            "data": {
                "events": ["files.create"],
                "channels": channels,
                "timestamp": 1_700_000_000,
                "payload": {"id": "f1"}
            }
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_subscribes_produces_one_connect() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _a = client.subscribe("documents", |_| {}).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let _b = client.subscribe("files", |_| {}).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let _c = client.subscribe("account", |_| {}).await;
        settle().await;

        assert_eq!(factory.connects(), 1);
        let link = factory.link(0);
        assert_eq!(link.url, "wss://api.test/v1");
        assert_eq!(link.params.project, "p1");
        assert_eq!(link.params.channels, "account,documents,files");
        assert!(!link.params.reconnection);
        assert!(client.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_channel_set_tears_down_without_retry() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let subscription = client.subscribe("files", |_| {}).await;
        settle().await;
        assert_eq!(factory.connects(), 1);

        subscription.unsubscribe().await;
        settle().await;

        assert!(factory.link(0).is_disconnected());
        assert_eq!(client.connection_state().await, ConnectionState::Idle);
        assert!(client.active_channels().await.is_empty());

        // No reconnect ever fires.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(factory.attempts_made(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribing_twice_is_idempotent() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let subscription = client.subscribe("files", |_| {}).await;
        settle().await;

        subscription.unsubscribe().await;
        subscription.unsubscribe().await;
        settle().await;

        assert_eq!(client.subscription_count().await, 0);
        assert_eq!(factory.attempts_made(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn event_fans_out_to_every_matching_subscription() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));
        let hits_c = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits_a);
        let _a = client
            .subscribe("documents", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        let counter = Arc::clone(&hits_b);
        let _b = client
            .subscribe("documents.42", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        let counter = Arc::clone(&hits_c);
        let _c = client
            .subscribe("account", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        settle().await;

        factory
            .link(0)
            .push(&event_json(&["documents", "documents.42"]))
            .await;

        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        assert_eq!(hits_c.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_channel_stops_receiving_events() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let payloads: Arc<StdMutex<Vec<Value>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&payloads);
        let files = client
            .subscribe("files", move |event| {
                sink.lock().unwrap().push(event.payload);
            })
            .await;
        // Second subscription keeps the connection alive after the first
        // goes away.
        let _other = client.subscribe("account", |_| {}).await;
        settle().await;

        factory.link(0).push(&event_json(&["files"])).await;
        {
            let seen = payloads.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0]["id"], "f1");
        }

        files.unsubscribe().await;
        settle().await;
        assert!(!client.active_channels().await.contains(&"files".to_string()));

        // Same message again: stale fan-in, nothing delivered.
        factory.link(0).push(&event_json(&["files"])).await;
        assert_eq!(payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_close_reconnects_with_backoff() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _sub = client.subscribe("files", |_| {}).await;
        settle().await;
        assert_eq!(factory.connects(), 1);

        factory.link(0).close("server restart").await;
        assert_eq!(client.connection_state().await, ConnectionState::Backoff);

        // First retry waits 1s.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(factory.connects(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(factory.connects(), 2);

        // Successful reconnect resets the attempt counter.
        assert_eq!(client.connection.attempts(), 0);
        assert!(client.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_is_retried() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));
        factory.fail_next.store(true, Ordering::SeqCst);

        let _sub = client.subscribe("files", |_| {}).await;
        settle().await;
        assert_eq!(factory.attempts_made(), 1);
        assert_eq!(factory.connects(), 0);

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(factory.attempts_made(), 2);
        assert_eq!(factory.connects(), 1);
        assert!(client.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn policy_violation_close_is_not_retried() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _sub = client.subscribe("files", |_| {}).await;
        settle().await;

        let link = factory.link(0);
        link.push(r#"{"type":"error","data":{"code":1008,"message":"unauthorized"}}"#)
            .await;
        link.close("policy violation").await;

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(factory.attempts_made(), 1);
        assert_eq!(client.connection.attempts(), 0);
        // The flag stays armed so a future voluntary reconnect still works.
        assert!(client.connection.reconnect_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn endpoint_change_replaces_the_connection() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _a = client.subscribe("files", |_| {}).await;
        settle().await;
        assert_eq!(factory.link(0).url, "wss://api.test/v1");

        client.set_realtime_endpoint("wss://rt.test/v1").await;
        let _b = client.subscribe("documents", |_| {}).await;
        settle().await;

        assert_eq!(factory.connects(), 2);
        assert!(factory.link(0).is_disconnected());
        assert_eq!(factory.link(1).url, "wss://rt.test/v1");
    }

    #[tokio::test(start_paused = true)]
    async fn channel_change_alone_keeps_the_connection() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _a = client.subscribe("files", |_| {}).await;
        settle().await;
        let _b = client.subscribe("documents", |_| {}).await;
        settle().await;

        assert_eq!(factory.connects(), 1);
        assert!(!factory.link(0).is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_connection_is_upgraded_with_fallback_session() {
        let factory = MockFactory::default();
        let sessions = Arc::new(MemorySessionStore::new());
        sessions.insert("a_session_p1", "tok-123");
        let client = test_client(&factory, sessions);

        let _sub = client.subscribe("account", |_| {}).await;
        settle().await;

        let link = factory.link(0);
        link.push(r#"{"type":"connected","data":{"channels":["account"]}}"#)
            .await;

        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        let message: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(message["type"], "authentication");
        assert_eq!(message["data"]["session"], "tok-123");
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_identity_skips_the_session_upgrade() {
        let factory = MockFactory::default();
        let sessions = Arc::new(MemorySessionStore::new());
        sessions.insert("a_session_p1", "tok-123");
        let client = test_client(&factory, sessions);

        let _sub = client.subscribe("account", |_| {}).await;
        settle().await;

        let link = factory.link(0);
        link.push(r#"{"type":"connected","data":{"channels":["account"],"user":{"$id":"u1"}}}"#)
            .await;

        assert!(link.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frame_does_not_stall_dispatch() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = client
            .subscribe("files", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        settle().await;

        let link = factory.link(0);
        link.push("{{{ definitely not json").await;
        link.push(&event_json(&["files"])).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_does_not_starve_other_subscriptions() {
        let factory = MockFactory::default();
        let client = test_client(&factory, Arc::new(MemorySessionStore::new()));

        let _bad = client
            .subscribe("files", |_| panic!("subscriber bug"))
            .await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _good = client
            .subscribe("files", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        settle().await;

        let link = factory.link(0);
        link.push(&event_json(&["files"])).await;
        link.push(&event_json(&["files"])).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
