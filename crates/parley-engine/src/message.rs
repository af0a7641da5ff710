//! Message types for conversation transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the person using the session.
    User,
    /// Reply produced by the responder (or substituted on failure).
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a transcript.
///
/// Messages are only ever created by [`MessageStore::append`](crate::MessageStore::append),
/// which assigns the id and timestamp. Fields are read-only from outside the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(role: Role, content: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp,
        }
    }

    /// Unique message id (UUID v4).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Role of the author.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When the store appended this message.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_new_assigns_uuid() {
        let msg = Message::new(Role::User, "Hello".into(), Utc::now());
        assert_eq!(msg.id().len(), 36);
        assert!(msg.id().chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "Hello");
        assert!(msg.is_user());
        assert!(!msg.is_assistant());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let now = Utc::now();
        let a = Message::new(Role::Assistant, "a".into(), now);
        let b = Message::new(Role::Assistant, "a".into(), now);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");

        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);

        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
