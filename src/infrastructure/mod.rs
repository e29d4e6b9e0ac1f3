// Infrastructure module - reconnect scheduling and host-provided stores
pub mod backoff;
pub mod session;

pub use backoff::retry_delay;
pub use session::{session_key, MemorySessionStore, SessionStore};
