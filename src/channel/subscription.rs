use crate::client::RealtimeClient;

/// Capability returned by [`RealtimeClient::subscribe`].
///
/// Holds only the subscription handle and a reference back to the owning
/// client. Calling [`unsubscribe`](Self::unsubscribe) removes the
/// registration; dropping the value does not — removal is always explicit.
#[derive(Clone)]
pub struct Subscription {
    pub(crate) client: RealtimeClient,
    pub(crate) id: u64,
}

impl Subscription {
    /// The handle id, unique within this client for the process lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the subscription, releases channels no other subscription
    /// references, and lets the connection follow the new channel set.
    ///
    /// Safe to call more than once; subsequent calls are no-ops.
    pub async fn unsubscribe(&self) {
        self.client.remove_subscription(self.id).await;
    }
}
