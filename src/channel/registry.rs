use crate::types::RealtimeEvent;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Callback invoked for every event matching a subscription's channels.
pub type EventCallback = Arc<dyn Fn(RealtimeEvent) + Send + Sync>;

/// One-or-many channel names accepted by `subscribe`.
pub struct Channels(Vec<String>);

impl Channels {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Channels {
    fn from(channel: &str) -> Self {
        Self(vec![channel.to_string()])
    }
}

impl From<String> for Channels {
    fn from(channel: String) -> Self {
        Self(vec![channel])
    }
}

impl From<Vec<String>> for Channels {
    fn from(channels: Vec<String>) -> Self {
        Self(channels)
    }
}

impl From<Vec<&str>> for Channels {
    fn from(channels: Vec<&str>) -> Self {
        Self(channels.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Channels {
    fn from(channels: [&str; N]) -> Self {
        Self(channels.iter().map(|c| c.to_string()).collect())
    }
}

pub(crate) struct SubscriptionEntry {
    pub channels: Vec<String>,
    pub callback: EventCallback,
}

/// Insertion-ordered registry of live subscriptions, plus the de-duplicated
/// union of their channel names.
///
/// The channel set is maintained incrementally so membership tests during
/// dispatch are O(1): a name is present exactly while at least one live
/// subscription lists it.
pub struct SubscriptionRegistry {
    subscriptions: BTreeMap<u64, SubscriptionEntry>,
    channels: HashSet<String>,
    counter: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            channels: HashSet::new(),
            counter: 0,
        }
    }

    /// Registers a subscription and unions its channels into the channel set.
    /// Returns a fresh handle; handles are never reused.
    pub fn add(&mut self, channels: Vec<String>, callback: EventCallback) -> u64 {
        for channel in &channels {
            self.channels.insert(channel.clone());
        }

        let id = self.counter;
        self.counter += 1;
        self.subscriptions
            .insert(id, SubscriptionEntry { channels, callback });
        id
    }

    /// Removes a subscription and drops every channel of it that no remaining
    /// subscription references. Unknown handles are a no-op.
    pub fn remove(&mut self, id: u64) -> bool {
        let Some(entry) = self.subscriptions.remove(&id) else {
            return false;
        };
        self.clean_up(&entry.channels);
        true
    }

    // Linear scan over subscriptions per channel; cardinality is tens of
    // entries per client.
    fn clean_up(&mut self, channels: &[String]) {
        for channel in channels {
            let referenced = self
                .subscriptions
                .values()
                .any(|entry| entry.channels.contains(channel));
            if !referenced {
                self.channels.remove(channel);
            }
        }
    }

    /// Whether any of the given channels is in the channel set.
    pub fn is_listening(&self, channels: &[String]) -> bool {
        channels.iter().any(|channel| self.channels.contains(channel))
    }

    /// Callbacks of every subscription whose channel list intersects the
    /// given channels, in subscription order.
    pub fn matching_callbacks(&self, channels: &[String]) -> Vec<EventCallback> {
        self.subscriptions
            .values()
            .filter(|entry| entry.channels.iter().any(|c| channels.contains(c)))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    /// Sorted snapshot of the channel set, as advertised to the server.
    pub fn channel_list(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.iter().cloned().collect();
        channels.sort();
        channels
    }

    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
