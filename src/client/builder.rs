use super::{ClientState, ConnectionManager, RealtimeClient};
use crate::infrastructure::{MemorySessionStore, SessionStore};
use crate::types::{RealtimeError, Result};
use crate::websocket::{TransportFactory, WebSocketFactory};
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Client configuration, shared in shape with the platform's REST caller:
/// primary endpoint, optional realtime endpoint override, project id.
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    /// Primary HTTP endpoint, e.g. `https://api.nuvix.in/v1`.
    pub endpoint: String,
    /// Explicit realtime endpoint. When unset it is derived from `endpoint`
    /// by scheme substitution.
    pub endpoint_realtime: Option<String>,
    /// Project identifier sent as a connect-time query parameter.
    pub project: String,
}

impl RealtimeConfig {
    pub fn new(endpoint: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            endpoint_realtime: None,
            project: project.into(),
        }
    }

    pub fn with_realtime_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_realtime = Some(endpoint.into());
        self
    }

    /// The realtime endpoint: the explicit override if set, otherwise the
    /// primary endpoint with its scheme swapped (`http→ws`, `https→wss`).
    pub fn realtime_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint_realtime {
            return Ok(endpoint.clone());
        }

        let mut url = Url::parse(&self.endpoint)?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(RealtimeError::Config(format!(
                    "cannot derive realtime endpoint from scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme).map_err(|_| {
            RealtimeError::Config(format!(
                "cannot derive realtime endpoint from '{}'",
                self.endpoint
            ))
        })?;
        Ok(url.to_string())
    }
}

/// Builder for [`RealtimeClient`]; wires in the transport factory and the
/// session store, defaulting to the WebSocket transport and an empty
/// in-memory store.
pub struct RealtimeClientBuilder {
    config: RealtimeConfig,
    factory: Arc<dyn TransportFactory>,
    sessions: Arc<dyn SessionStore>,
}

impl RealtimeClientBuilder {
    pub fn new(config: RealtimeConfig) -> Result<Self> {
        if config.project.is_empty() {
            return Err(RealtimeError::Config("project id is required".to_string()));
        }

        Ok(Self {
            config,
            factory: Arc::new(WebSocketFactory),
            sessions: Arc::new(MemorySessionStore::new()),
        })
    }

    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn build(self) -> RealtimeClient {
        RealtimeClient {
            config: Arc::new(RwLock::new(self.config)),
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(ClientState::new())),
            factory: self.factory,
            sessions: self.sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ws_scheme_from_http() {
        let config = RealtimeConfig::new("http://api.nuvix.in/v1", "p1");
        assert_eq!(config.realtime_endpoint().unwrap(), "ws://api.nuvix.in/v1");
    }

    #[test]
    fn derives_wss_scheme_from_https() {
        let config = RealtimeConfig::new("https://api.nuvix.in/v1", "p1");
        assert_eq!(config.realtime_endpoint().unwrap(), "wss://api.nuvix.in/v1");
    }

    #[test]
    fn explicit_realtime_endpoint_wins() {
        let config = RealtimeConfig::new("https://api.nuvix.in/v1", "p1")
            .with_realtime_endpoint("wss://realtime.nuvix.in/v1");
        assert_eq!(
            config.realtime_endpoint().unwrap(),
            "wss://realtime.nuvix.in/v1"
        );
    }

    #[test]
    fn builder_rejects_missing_project() {
        let config = RealtimeConfig::new("https://api.nuvix.in/v1", "");
        assert!(matches!(
            RealtimeClientBuilder::new(config),
            Err(RealtimeError::Config(_))
        ));
    }
}
