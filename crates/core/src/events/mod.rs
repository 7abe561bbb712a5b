//! Transient group notifications.
//!
//! Events are delivered to live subscribers of a group and never persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::chat::Message;

/// An event delivered to the subscribers of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// A member started or stopped typing.
    #[serde(rename_all = "camelCase")]
    Typing {
        group_id: String,
        user_id: String,
        typing: bool,
        at: DateTime<Utc>,
    },
    /// A message was committed to the group.
    MessageSent { message: Message },
}

impl ChatEvent {
    pub fn typing(group_id: impl Into<String>, user_id: impl Into<String>, typing: bool) -> Self {
        ChatEvent::Typing {
            group_id: group_id.into(),
            user_id: user_id.into(),
            typing,
            at: crate::chat::ids::now(),
        }
    }

    pub fn message_sent(message: Message) -> Self {
        ChatEvent::MessageSent { message }
    }

    /// Group the event belongs to.
    pub fn group_id(&self) -> &str {
        match self {
            ChatEvent::Typing { group_id, .. } => group_id,
            ChatEvent::MessageSent { message } => &message.group_id,
        }
    }

    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::Typing { .. } => "typing",
            ChatEvent::MessageSent { .. } => "messageSent",
        }
    }
}

/// Errors that can occur while delivering events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PubSubError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),
}

/// Result type for pub/sub operations.
pub type Result<T> = std::result::Result<T, PubSubError>;

/// Per-group event fan-out.
#[async_trait]
pub trait ChatPubSub: Send + Sync {
    /// Publishes an event to the subscribers of a group.
    async fn publish(&self, group_id: &str, event: &ChatEvent) -> Result<()>;

    /// Subscribes to the events of a group.
    async fn subscribe(&self, group_id: &str) -> Result<broadcast::Receiver<ChatEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_event_serialization() {
        let event = ChatEvent::typing("G1", "U2", true);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "typing");
        assert_eq!(json["groupId"], "G1");
        assert_eq!(json["userId"], "U2");
        assert_eq!(json["typing"], true);
        assert_eq!(event.event_type(), "typing");
    }

    #[test]
    fn test_message_sent_group_id() {
        let event = ChatEvent::message_sent(Message::new("G1", "U2", "hi"));
        assert_eq!(event.group_id(), "G1");
        assert_eq!(event.event_type(), "messageSent");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "messageSent");
        assert_eq!(json["message"]["text"], "hi");
    }

    #[test]
    fn test_pubsub_error_display() {
        let error = PubSubError::PublishFailed("channel closed".to_string());
        assert_eq!(error.to_string(), "Publish failed: channel closed");
    }
}
