//! The remote responder that produces assistant replies.
//!
//! The controller only sees the [`Responder`] trait. [`CommandResponder`]
//! is the concrete implementation that shells out to a model CLI.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{PromptMode, ResponderConfig};

/// Produces assistant text for a piece of user text.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Return the reply to `user_text`, or the reason none could be produced.
    async fn respond(&self, user_text: &str) -> Result<String, ResponderError>;
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Box<R> {
    async fn respond(&self, user_text: &str) -> Result<String, ResponderError> {
        (**self).respond(user_text).await
    }
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for std::sync::Arc<R> {
    async fn respond(&self, user_text: &str) -> Result<String, ResponderError> {
        (**self).respond(user_text).await
    }
}

/// Responder backed by an external model CLI process.
#[derive(Debug, Clone)]
pub struct CommandResponder {
    config: ResponderConfig,
}

impl CommandResponder {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Whether the configured program can be found on PATH.
    pub fn is_available(&self) -> bool {
        self.config
            .program()
            .is_some_and(|program| which::which(program).is_ok())
    }

    fn build_command(&self, prompt: &str) -> Result<Command, ResponderError> {
        let (program, args) = self
            .config
            .command_argv
            .split_first()
            .ok_or_else(|| ResponderError::Config("command_argv is empty".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if self.config.prompt_mode == PromptMode::Argument {
            cmd.arg(prompt);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }

    async fn run(&self, prompt: &str) -> Result<String, ResponderError> {
        let mut child = self
            .build_command(prompt)?
            .spawn()
            .map_err(ResponderError::Spawn)?;

        // Feed stdin while draining stdout/stderr, or a chatty child can
        // block on a full pipe while we block on its stdin.
        let stdin = child.stdin.take();
        let write_prompt = async move {
            if let Some(mut stdin) = stdin {
                if self.config.prompt_mode == PromptMode::Stdin {
                    stdin.write_all(prompt.as_bytes()).await?;
                }
                // Dropping stdin signals EOF
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());
        let output = output.map_err(ResponderError::Io)?;

        // A child may exit without reading all of its input
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ResponderError::Io(e));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(ResponderError::Exit {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        // Some CLIs answer on stderr
        let reply = if stdout.trim().is_empty() {
            stderr
        } else {
            stdout
        };

        let reply = reply.trim_end().to_string();
        if reply.trim().is_empty() {
            return Err(ResponderError::EmptyReply);
        }
        Ok(reply)
    }
}

#[async_trait]
impl Responder for CommandResponder {
    async fn respond(&self, user_text: &str) -> Result<String, ResponderError> {
        match self.config.timeout_seconds {
            Some(secs) => timeout(Duration::from_secs(secs), self.run(user_text))
                .await
                // The child is killed by kill_on_drop when the future is dropped
                .map_err(|_| ResponderError::Timeout(self.config.name.clone()))?,
            None => self.run(user_text).await,
        }
    }
}

/// Errors a responder can report.
///
/// The controller treats every variant the same way; the distinction only
/// matters for logs.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// I/O error talking to the process.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Failed to spawn process.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Process did not finish in time.
    #[error("Responder timed out: {0}")]
    Timeout(String),

    /// Process exited unsuccessfully.
    #[error("Responder exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    /// Responder produced no text.
    #[error("Responder returned an empty reply")]
    EmptyReply,

    /// Responder is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure reported by a responder implementation.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> ResponderConfig {
        ResponderConfig {
            name: "sh".into(),
            command_argv: vec!["sh".into(), "-c".into(), script.into()],
            prompt_mode: PromptMode::Stdin,
            timeout_seconds: Some(10),
        }
    }

    #[tokio::test]
    async fn test_stdin_prompt_is_echoed() {
        let responder = CommandResponder::new(shell("cat"));
        let reply = responder.respond("Hello").await.unwrap();
        assert_eq!(reply, "Hello");
    }

    #[tokio::test]
    async fn test_large_prompt_round_trips() {
        let config = ResponderConfig {
            name: "cat".into(),
            command_argv: vec!["cat".into()],
            prompt_mode: PromptMode::Stdin,
            timeout_seconds: Some(10),
        };
        let prompt = "x".repeat(1_000_000);
        let reply = CommandResponder::new(config).respond(&prompt).await.unwrap();
        assert_eq!(reply.len(), 1_000_000);
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_still_answers() {
        let responder = CommandResponder::new(shell("echo early"));
        let reply = responder.respond(&"x".repeat(1_000_000)).await.unwrap();
        assert_eq!(reply, "early");
    }

    #[tokio::test]
    async fn test_argument_prompt() {
        let config = ResponderConfig {
            name: "echo".into(),
            command_argv: vec!["echo".into()],
            prompt_mode: PromptMode::Argument,
            timeout_seconds: Some(10),
        };
        let reply = CommandResponder::new(config).respond("Hi there").await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_stderr_used_when_stdout_empty() {
        let responder = CommandResponder::new(shell("cat >/dev/null; echo 'from stderr' >&2"));
        let reply = responder.respond("ignored").await.unwrap();
        assert_eq!(reply, "from stderr");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let responder = CommandResponder::new(shell("cat >/dev/null; echo boom >&2; exit 3"));
        let err = responder.respond("x").await.unwrap_err();
        match err {
            ResponderError::Exit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("Expected Exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let responder = CommandResponder::new(shell("cat >/dev/null"));
        let err = responder.respond("x").await.unwrap_err();
        assert!(matches!(err, ResponderError::EmptyReply));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut config = shell("sleep 5");
        config.timeout_seconds = Some(1);
        let err = CommandResponder::new(config).respond("x").await.unwrap_err();
        assert!(matches!(err, ResponderError::Timeout(name) if name == "sh"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = ResponderConfig::default_for("parley-definitely-not-installed");
        let responder = CommandResponder::new(config);
        assert!(!responder.is_available());

        let err = responder.respond("x").await.unwrap_err();
        assert!(matches!(err, ResponderError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_empty_argv_is_config_error() {
        let mut config = shell("cat");
        config.command_argv.clear();
        let err = CommandResponder::new(config).respond("x").await.unwrap_err();
        assert!(matches!(err, ResponderError::Config(_)));
    }
}
