//! Channel bookkeeping: one [`Channel`] per path, created on first request
//! and destroyed only with the owning client.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;
use wiremux_packet::DEFAULT_CHANNEL;

use crate::channel::Channel;

#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
}

impl ChannelRegistry {
    /// A registry holding the default channel.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.get_or_create(DEFAULT_CHANNEL, None);
        registry
    }

    pub fn contains(&self, path: &str) -> bool {
        self.channels.contains_key(path)
    }

    /// Return the channel for `path`, creating it on first request.
    ///
    /// Auth is connection-time only: supplying auth for an existing channel
    /// is ignored with a warning rather than silently accepted.
    pub fn get_or_create(&mut self, path: &str, auth: Option<Value>) -> &mut Channel {
        if self.channels.contains_key(path) {
            if auth.is_some() {
                warn!(path, "auth ignored for existing channel; auth cannot change after creation");
            }
        } else {
            self.channels
                .insert(path.to_string(), Channel::new(path, auth));
        }
        self.channels.get_mut(path).expect("channel just ensured")
    }

    pub fn get(&self, path: &str) -> Option<&Channel> {
        self.channels.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Channel> {
        self.channels.get_mut(path)
    }

    /// The channel a packet routes to: its own path when known, otherwise
    /// the default channel.
    pub fn route_mut(&mut self, path: &str) -> &mut Channel {
        let key = if self.channels.contains_key(path) {
            path
        } else {
            DEFAULT_CHANNEL
        };
        self.channels.get_mut(key).expect("default channel always exists")
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;

    #[test]
    fn test_default_channel_always_present() {
        let mut registry = ChannelRegistry::new();
        assert!(registry.contains("/"));
        assert_eq!(registry.route_mut("/nowhere").path(), "/");
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = ChannelRegistry::new();
        registry.get_or_create("/game", None).handle_connect(&crate::Dispatcher::new());
        // Same path hands back the same underlying channel, state intact.
        assert_eq!(
            registry.get_or_create("/game", None).state(),
            ChannelState::Connected
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_second_auth_ignored() {
        let mut registry = ChannelRegistry::new();
        let first = registry
            .get_or_create("/admin", Some(serde_json::json!({"token": "first"})))
            .connect_packet()
            .unwrap();

        // A later request supplying different auth changes nothing.
        let channel = registry.get_or_create("/admin", Some(serde_json::json!({"token": "other"})));
        channel.handle_disconnect();
        let second = channel.connect_packet().unwrap();
        assert_eq!(first.payload, second.payload);
        assert_eq!(first.payload.as_deref(), Some(r#"{"token":"first"}"#));
    }

    #[test]
    fn test_routing_falls_back_to_default() {
        let mut registry = ChannelRegistry::new();
        registry.get_or_create("/known", None);
        assert_eq!(registry.route_mut("/known").path(), "/known");
        assert_eq!(registry.route_mut("/unknown").path(), "/");
    }
}
