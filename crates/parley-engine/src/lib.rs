//! parley-engine: Headless engine for conversational sessions
//!
//! This crate provides the core of parley, including:
//! - The append-only message store and session object
//! - The conversation controller (send pipeline, pending flag, fallback replies)
//! - Responders that reach a model CLI
//! - Configuration and session persistence

pub mod config;
pub mod controller;
pub mod message;
pub mod persistence;
pub mod responder;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{ChatStrings, Config, ConfigError, PromptMode, ResponderConfig};
pub use controller::{ConversationController, SendOutcome, SkipReason, FALLBACK_ERROR_TEXT};
pub use message::{Message, Role};
pub use persistence::{PersistenceError, SessionStore, SessionSummary};
pub use responder::{CommandResponder, Responder, ResponderError};
pub use session::Session;
pub use store::{MessageStore, StoreError};

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_version() {
        let version = engine_version();
        assert!(!version.is_empty());
        assert!(version.starts_with("0."));
    }
}
