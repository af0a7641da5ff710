//! In-memory transcript storage.
//!
//! [`MessageStore`] is the only type that mutates a transcript. It never
//! reorders or edits messages; the only write is [`MessageStore::append`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// Ordered, append-only list of messages for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a previously saved transcript.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Snapshot of the current transcript.
    ///
    /// The returned vector does not track later appends; read it again
    /// after each append to observe new state.
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Append a new message and return it.
    ///
    /// User content is trimmed before storage. The timestamp never goes
    /// backwards relative to the previous message, even if the wall clock does.
    pub fn append(&mut self, content: &str, role: Role) -> Result<Message, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent(role));
        }

        let content = match role {
            Role::User => content.trim().to_string(),
            Role::Assistant => content.to_string(),
        };

        Ok(self.push(role, content))
    }

    /// Append without validation. Callers guarantee `content` is non-empty.
    pub(crate) fn push(&mut self, role: Role, content: String) -> Message {
        debug_assert!(!content.trim().is_empty());
        let now = Utc::now();
        let timestamp = match self.messages.last() {
            Some(last) if last.timestamp() > now => last.timestamp(),
            _ => now,
        };

        let message = Message::new(role, content, timestamp);
        self.messages.push(message.clone());
        message
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recently appended message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Iterate messages in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Messages appended after the first `start` entries.
    pub fn since(&self, start: usize) -> &[Message] {
        let start = start.min(self.messages.len());
        &self.messages[start..]
    }
}

/// Errors from transcript operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Content was empty after trimming.
    #[error("Refusing to append empty {0} message")]
    EmptyContent(Role),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_created_message() {
        let mut store = MessageStore::new();
        let msg = store.append("Hello", Role::User).unwrap();

        assert_eq!(msg.content(), "Hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(store.len(), 1);
        assert_eq!(store.last(), Some(&msg));
    }

    #[test]
    fn test_append_trims_user_content() {
        let mut store = MessageStore::new();
        let msg = store.append("  Hello there \n", Role::User).unwrap();
        assert_eq!(msg.content(), "Hello there");
    }

    #[test]
    fn test_append_keeps_assistant_content_verbatim() {
        let mut store = MessageStore::new();
        let reply = "  indented code\n";
        let msg = store.append(reply, Role::Assistant).unwrap();
        assert_eq!(msg.content(), reply);
    }

    #[test]
    fn test_append_rejects_empty_content() {
        let mut store = MessageStore::new();

        assert_eq!(
            store.append("", Role::User),
            Err(StoreError::EmptyContent(Role::User))
        );
        assert_eq!(
            store.append(" \t\n", Role::Assistant),
            Err(StoreError::EmptyContent(Role::Assistant))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_history_is_snapshot() {
        let mut store = MessageStore::new();
        store.append("first", Role::User).unwrap();

        let snapshot = store.history();
        store.append("second", Role::Assistant).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn test_history_preserves_insertion_order() {
        let mut store = MessageStore::new();
        for i in 0..10 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append(&format!("message {i}"), role).unwrap();
        }

        let history = store.history();
        for (i, msg) in history.iter().enumerate() {
            assert_eq!(msg.content(), format!("message {i}"));
        }
        for pair in history.windows(2) {
            assert!(pair[0].timestamp() <= pair[1].timestamp());
        }
    }

    #[test]
    fn test_timestamp_never_goes_backwards() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let loaded = Message::new(Role::Assistant, "from the future".into(), future);
        let mut store = MessageStore::from_messages(vec![loaded]);

        let msg = store.append("now", Role::User).unwrap();
        assert_eq!(msg.timestamp(), future);
    }

    #[test]
    fn test_since() {
        let mut store = MessageStore::new();
        store.append("a", Role::User).unwrap();
        store.append("b", Role::Assistant).unwrap();
        store.append("c", Role::User).unwrap();

        let tail: Vec<_> = store.since(1).iter().map(Message::content).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert!(store.since(10).is_empty());
    }
}
