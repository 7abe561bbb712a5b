//! In-memory pub/sub implementation.
//!
//! Provides a thread-safe pub/sub mechanism for group events using
//! tokio broadcast channels.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use groupchat_core::events::{ChatEvent, ChatPubSub, Result};

/// Default channel capacity for pub/sub messages.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// In-memory pub/sub implementation.
///
/// Each group has its own channel for targeted event delivery. Subscribers
/// that fall more than `capacity` events behind miss the oldest ones.
#[derive(Debug, Clone)]
pub struct MemoryPubSub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChatEvent>>>>,
    capacity: usize,
}

impl MemoryPubSub {
    /// Creates a new empty pub/sub instance.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Gets or creates a channel for the given group ID.
    async fn get_or_create_channel(&self, group_id: &str) -> broadcast::Sender<ChatEvent> {
        // Try read lock first to avoid write contention
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(group_id) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;

        // Double-check after acquiring write lock
        if let Some(sender) = channels.get(group_id) {
            return sender.clone();
        }

        let (sender, _) = broadcast::channel(self.capacity);
        channels.insert(group_id.to_string(), sender.clone());
        sender
    }
}

impl Default for MemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatPubSub for MemoryPubSub {
    async fn publish(&self, group_id: &str, event: &ChatEvent) -> Result<()> {
        let sender = self.get_or_create_channel(group_id).await;

        // No receivers just means nobody is watching this group.
        let delivered = sender.send(event.clone()).unwrap_or(0);
        tracing::trace!(group_id, delivered, event = event.event_type(), "Published event");

        Ok(())
    }

    async fn subscribe(&self, group_id: &str) -> Result<broadcast::Receiver<ChatEvent>> {
        let sender = self.get_or_create_channel(group_id).await;
        Ok(sender.subscribe())
    }
}
