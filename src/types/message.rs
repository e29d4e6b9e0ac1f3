use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message received from the realtime server.
///
/// The wire format is `{"type": <discriminant>, "data": <payload>}`. Message
/// types this client does not know are mapped to [`ServerMessage::Unknown`]
/// and ignored by the router.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once after the socket opens; carries the channels the server
    /// associated with this connection and, if already resolved, the user.
    Connected(ConnectedPayload),

    /// An event on one or more channels.
    Event(RealtimeEvent),

    /// Server-side error. Recorded so the close handler can inspect it.
    Error(ErrorPayload),

    Unknown,
}

// Manual impl because `#[serde(other)]` on an adjacently tagged enum rejects
// unknown types whose `data` is not a unit value.
impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            data: Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        let message = match raw.kind.as_str() {
            "connected" => ServerMessage::Connected(
                serde_json::from_value(raw.data).map_err(serde::de::Error::custom)?,
            ),
            "event" => ServerMessage::Event(
                serde_json::from_value(raw.data).map_err(serde::de::Error::custom)?,
            ),
            "error" => ServerMessage::Error(
                serde_json::from_value(raw.data).map_err(serde::de::Error::custom)?,
            ),
            _ => ServerMessage::Unknown,
        };
        Ok(message)
    }
}

/// Payload of a `connected` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    #[serde(default)]
    pub channels: Vec<String>,
    /// Identity the server resolved for this connection, if any. Absent for
    /// anonymous connections; the client may then upgrade via a persisted
    /// session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

/// Payload of an `event` message, delivered to subscription callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub events: Vec<String>,
    pub channels: Vec<String>,
    pub timestamp: f64,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of an `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: i64,
    pub message: String,
}

/// A message sent by the client over the live socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Upgrades an anonymous connection with a persisted session token,
    /// without reopening the socket.
    Authentication { session: String },
}
