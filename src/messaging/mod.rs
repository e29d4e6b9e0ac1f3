// Messaging module - inbound message routing
pub mod router;

pub use router::MessageRouter;
