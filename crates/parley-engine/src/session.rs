//! Session state for a single conversation.
//!
//! A [`Session`] bundles the transcript with the bookkeeping that used to
//! live in ambient UI state: the id, the "already initialized" flag and
//! timestamps. It is created, handed to a controller, and discarded (or
//! saved) when the conversation ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role};
use crate::store::{MessageStore, StoreError};

const DEFAULT_TITLE: &str = "New Conversation";
const TITLE_MAX_CHARS: usize = 50;

/// One conversation and its transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID).
    pub id: String,

    /// Title derived from the first user message.
    pub title: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the transcript last changed.
    pub updated_at: DateTime<Utc>,

    /// Whether the welcome step has already run for this session lifecycle.
    ///
    /// Not persisted: a resumed session goes through initialization again,
    /// which is a no-op for a non-empty transcript.
    #[serde(skip)]
    initialized: bool,

    messages: MessageStore,
}

impl Session {
    /// Create a new, empty session.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create an empty session with a specific ID.
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.into(),
            created_at: now,
            updated_at: now,
            initialized: false,
            messages: MessageStore::new(),
        }
    }

    /// Create a session around a previously saved transcript.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut session = Self::new();
        session.title = derive_title(&messages);
        session.messages = MessageStore::from_messages(messages);
        session
    }

    /// The transcript.
    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Snapshot of the transcript.
    pub fn history(&self) -> Vec<Message> {
        self.messages.history()
    }

    /// Append through the store, keeping title and `updated_at` in step.
    pub fn append(&mut self, content: &str, role: Role) -> Result<Message, StoreError> {
        let first_user = self.is_first_user(role);
        let message = self.messages.append(content, role)?;
        Ok(self.record(message, first_user))
    }

    /// Append content already checked to be non-empty (and trimmed, for users).
    pub(crate) fn push(&mut self, role: Role, content: String) -> Message {
        let first_user = self.is_first_user(role);
        let message = self.messages.push(role, content);
        self.record(message, first_user)
    }

    fn is_first_user(&self, role: Role) -> bool {
        role == Role::User && !self.messages.iter().any(Message::is_user)
    }

    fn record(&mut self, message: Message, first_user: bool) -> Message {
        if first_user {
            self.title = truncate_title(message.content());
        }
        self.updated_at = message.timestamp();
        message
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.is_user())
        .map_or_else(|| DEFAULT_TITLE.to_string(), |m| truncate_title(m.content()))
}

fn truncate_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}
