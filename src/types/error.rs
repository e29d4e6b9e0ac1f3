use thiserror::Error;

/// Errors that can occur inside the realtime client.
///
/// Connection-level failures are handled internally by the reconnect loop and
/// never surface through `subscribe`/`unsubscribe`; these variants appear on
/// the transport and configuration seams.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid client configuration (missing project id, bad endpoint)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint URL cannot be parsed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Attempted to send while no transport is live
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
