use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topic::Topic;

/// Unique message identifier. Compared by content: two copies of the same
/// message on different nodes carry equal ids.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An immutable unit of content moving through the network.
///
/// Delivery status is tracked by the receiving environment, not on the
/// message itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub topic: Topic,
    /// Absolute sim time the message was created.
    pub created: f64,
    /// Payload size in bytes; drives transfer duration.
    pub size: u32,
    /// Time-to-live in seconds from creation; `None` never expires.
    pub ttl: Option<f64>,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, topic: impl Into<Topic>, created: f64, size: u32) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            created,
            size,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Whether the message's time-to-live has run out at `now`.
    pub fn is_expired(&self, now: f64) -> bool {
        self.ttl.is_some_and(|ttl| now - self.created >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ttl_never_expires() {
        let msg = Message::new("M1", "news", 0.0, 100);
        assert!(!msg.is_expired(1e9));
    }

    #[test]
    fn test_ttl_expiry_boundary() {
        let msg = Message::new("M1", "news", 100.0, 100).with_ttl(50.0);
        assert!(!msg.is_expired(149.9));
        assert!(msg.is_expired(150.0));
        assert!(msg.is_expired(151.0));
    }

    #[test]
    fn test_id_content_equality() {
        assert_eq!(MessageId::from("M7"), MessageId::new("M7".to_string()));
    }
}
