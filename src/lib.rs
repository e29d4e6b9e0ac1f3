//! # Nuvix Realtime
//!
//! Client-side realtime channel multiplexer for the Nuvix backend platform.
//!
//! One persistent WebSocket connection carries any number of logical
//! subscriptions. Subscribing registers a callback for a set of channels;
//! the client advertises the union of all subscribed channels to the server,
//! reconnects with backoff after unexpected closes, and fans inbound events
//! out to every subscription whose channels match.
//!
//! ## Example
//!
//! ```no_run
//! use nuvix_realtime::{RealtimeClient, RealtimeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(RealtimeConfig::new(
//!         "https://api.nuvix.in/v1",
//!         "my-project",
//!     ))?;
//!
//!     let subscription = client
//!         .subscribe(["documents", "files"], |event| {
//!             println!("{:?} on {:?}: {}", event.events, event.channels, event.payload);
//!         })
//!         .await;
//!
//!     // ... when no longer interested:
//!     subscription.unsubscribe().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{Channels, Subscription};
pub use client::{
    ConnectionManager, ConnectionState, RealtimeClient, RealtimeClientBuilder, RealtimeConfig,
};
pub use infrastructure::{MemorySessionStore, SessionStore};
pub use messaging::MessageRouter;
pub use types::{
    ClientMessage, ConnectedPayload, ErrorPayload, RealtimeError, RealtimeEvent, Result,
    ServerMessage,
};
pub use websocket::{ConnectParams, Transport, TransportEvent, TransportFactory, WebSocketFactory};
