// WebSocket module - transport seam and the tungstenite-backed implementation
pub mod factory;
pub mod transport;

pub use factory::WebSocketFactory;
pub use transport::{ConnectParams, Transport, TransportEvent, TransportFactory};
