// Module declarations
pub mod registry;
mod subscription;

// Public API exports
pub use registry::{Channels, EventCallback, SubscriptionRegistry};
pub use subscription::Subscription;
