//! Configuration types for parley.
//!
//! This module defines the configuration schema: the user-facing chat
//! strings and the command used to reach the responder.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for parley.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Localized chat strings.
    #[serde(default)]
    pub strings: ChatStrings,

    /// Responder invocation settings.
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// Strings shown around the conversation.
///
/// Only `welcome` reaches the transcript; the other two belong to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStrings {
    /// First assistant message of a new session.
    #[serde(default = "default_welcome")]
    pub welcome: String,

    /// Hint shown where the user types.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Label shown while a reply is pending.
    #[serde(default = "default_thinking")]
    pub thinking: String,
}

fn default_welcome() -> String {
    "Hello! How can I help you today?".into()
}

fn default_placeholder() -> String {
    "Type your message...".into()
}

fn default_thinking() -> String {
    "Thinking...".into()
}

impl Default for ChatStrings {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            placeholder: default_placeholder(),
            thinking: default_thinking(),
        }
    }
}

/// How the prompt is handed to the responder process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Write the prompt to stdin and close it.
    #[default]
    Stdin,
    /// Pass the prompt as the final positional argument.
    Argument,
}

/// Configuration for the command-line responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Display name (e.g., "claude", "codex", "gemini").
    #[serde(default = "default_responder_name")]
    pub name: String,

    /// Command and arguments to invoke the model.
    #[serde(default = "default_command_argv")]
    pub command_argv: Vec<String>,

    /// How the prompt reaches the process.
    #[serde(default)]
    pub prompt_mode: PromptMode,

    /// Per-call timeout in seconds. `None` waits indefinitely.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: Option<u64>,
}

fn default_responder_name() -> String {
    "claude".into()
}

fn default_command_argv() -> Vec<String> {
    ResponderConfig::default_for("claude").command_argv
}

#[allow(clippy::unnecessary_wraps)]
fn default_timeout() -> Option<u64> {
    Some(300)
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self::default_for(&default_responder_name())
    }
}

impl ResponderConfig {
    /// Create a default configuration for a known model CLI.
    pub fn default_for(name: &str) -> Self {
        match name {
            "claude" => Self {
                name: "claude".into(),
                command_argv: vec![
                    "claude".into(),
                    "-p".into(),
                    "--output-format".into(),
                    "text".into(),
                ],
                prompt_mode: PromptMode::Stdin,
                timeout_seconds: default_timeout(),
            },
            "codex" => Self {
                name: "codex".into(),
                command_argv: vec!["codex".into(), "exec".into(), "-".into()],
                prompt_mode: PromptMode::Stdin,
                timeout_seconds: default_timeout(),
            },
            "gemini" => Self {
                name: "gemini".into(),
                command_argv: vec!["gemini".into(), "-p".into()],
                prompt_mode: PromptMode::Argument,
                timeout_seconds: default_timeout(),
            },
            _ => Self {
                name: name.into(),
                command_argv: vec![name.into()],
                prompt_mode: PromptMode::Stdin,
                timeout_seconds: default_timeout(),
            },
        }
    }

    /// The program to execute, if any is configured.
    pub fn program(&self) -> Option<&str> {
        self.command_argv.first().map(String::as_str)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Load configuration, falling back to defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        std::fs::write(path, content).map_err(ConfigError::Io)
    }
}

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading or writing config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing config JSON.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Error serializing config to JSON.
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.strings.welcome, "Hello! How can I help you today?");
        assert_eq!(config.responder.name, "claude");
        assert_eq!(config.responder.program(), Some("claude"));
        assert_eq!(config.responder.timeout_seconds, Some(300));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"strings": {"welcome": "Bienvenue !"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.strings.welcome, "Bienvenue !");
        assert_eq!(config.strings.thinking, "Thinking...");
        assert_eq!(config.responder, ResponderConfig::default());
    }

    #[test]
    fn test_timeout_can_be_disabled() {
        let json = r#"{"responder": {"name": "local", "command_argv": ["cat"], "timeout_seconds": null}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.responder.timeout_seconds, None);
        assert_eq!(config.responder.prompt_mode, PromptMode::Stdin);
    }

    #[test]
    fn test_responder_defaults() {
        let claude = ResponderConfig::default_for("claude");
        assert!(claude.command_argv.contains(&"claude".to_string()));
        assert_eq!(claude.prompt_mode, PromptMode::Stdin);

        let gemini = ResponderConfig::default_for("gemini");
        assert_eq!(gemini.prompt_mode, PromptMode::Argument);

        let custom = ResponderConfig::default_for("ollama");
        assert_eq!(custom.command_argv, vec!["ollama".to_string()]);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.strings.welcome = "Hi!".into();
        config.responder = ResponderConfig::default_for("codex");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.strings.welcome, "Hi!");
        assert_eq!(loaded.responder.name, "codex");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_or_default(&temp.path().join("missing.json")).unwrap();
        assert_eq!(config.strings, ChatStrings::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
