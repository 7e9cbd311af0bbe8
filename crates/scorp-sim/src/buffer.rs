use scorp_core::{Message, MessageId};

/// A node's held-message collection.
///
/// Vec-backed with insertion-ordered iteration so that connection scans walk
/// messages in a reproducible order. Populations here are small; linear id
/// lookups are fine.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    messages: Vec<Message>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message. A copy with the same id already present is left in
    /// place and the new one discarded.
    pub fn insert(&mut self, msg: Message) {
        if !self.contains(&msg.id) {
            self.messages.push(msg);
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Remove by id. Absent ids return `None`: multiple deletion paths may
    /// race to remove the same message within one tick, and later ones must
    /// be no-ops.
    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| &m.id == id)?;
        Some(self.messages.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Remove and return every message expired at `now`.
    pub fn drain_expired(&mut self, now: f64) -> Vec<Message> {
        let mut expired = Vec::new();
        self.messages.retain(|m| {
            if m.is_expired(now) {
                expired.push(m.clone());
                false
            } else {
                true
            }
        });
        expired
    }
}
