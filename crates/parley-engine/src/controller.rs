//! Conversation controller: the send pipeline.
//!
//! One [`ConversationController`] drives one [`Session`]. A send appends the
//! user turn, waits on the responder, then appends either the reply or
//! [`FALLBACK_ERROR_TEXT`]. At most one send is in flight; a second one
//! started while pending is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::message::{Message, Role};
use crate::responder::{Responder, ResponderError};
use crate::session::Session;

/// Assistant text substituted when the responder fails.
pub const FALLBACK_ERROR_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Why a send did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Input was empty or whitespace only.
    EmptyInput,
    /// Another send is still pending.
    Busy,
}

/// Result of a single [`ConversationController::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Nothing was appended.
    Skipped(SkipReason),
    /// The responder answered.
    Replied { user: Message, reply: Message },
    /// The responder failed and the fallback text was appended instead.
    Failed {
        user: Message,
        fallback: Message,
        error: ResponderError,
    },
}

impl SendOutcome {
    /// Messages appended by this send, in transcript order.
    pub fn appended(&self) -> Vec<&Message> {
        match self {
            Self::Skipped(_) => Vec::new(),
            Self::Replied { user, reply } => vec![user, reply],
            Self::Failed { user, fallback, .. } => vec![user, fallback],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Drives send cycles for one session.
pub struct ConversationController<R> {
    session: Mutex<Session>,
    responder: R,
    pending: AtomicBool,
    pending_tx: watch::Sender<bool>,
}

impl<R: Responder> ConversationController<R> {
    pub fn new(session: Session, responder: R) -> Self {
        let (pending_tx, _) = watch::channel(false);
        Self {
            session: Mutex::new(session),
            responder,
            pending: AtomicBool::new(false),
            pending_tx,
        }
    }

    /// Insert the welcome message into an empty transcript, once.
    ///
    /// Returns `true` if a message was appended. Repeated calls, and calls on
    /// a session resumed with history, append nothing.
    pub fn initialize(&self, welcome: &str) -> bool {
        let mut session = self.lock_session();
        if session.is_initialized() {
            return false;
        }
        session.mark_initialized();

        if !session.messages().is_empty() {
            debug!(session_id = %session.id, "Resumed session, skipping welcome");
            return false;
        }

        match session.append(welcome, Role::Assistant) {
            Ok(_) => {
                info!(session_id = %session.id, "Session initialized");
                true
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Welcome text is empty");
                false
            }
        }
    }

    /// Send one user message and record the reply.
    ///
    /// Never returns an error: responder failures become the fallback
    /// assistant message.
    pub async fn send(&self, raw_text: &str) -> SendOutcome {
        let text = raw_text.trim();
        if text.is_empty() {
            debug!("Ignoring empty input");
            return SendOutcome::Skipped(SkipReason::EmptyInput);
        }

        let Some(_guard) = PendingGuard::acquire(&self.pending, &self.pending_tx) else {
            debug!("Send already pending, dropping input");
            return SendOutcome::Skipped(SkipReason::Busy);
        };

        let user = self.lock_session().push(Role::User, text.to_string());

        let result = match self.responder.respond(user.content()).await {
            Ok(reply) if reply.trim().is_empty() => Err(ResponderError::EmptyReply),
            other => other,
        };

        let mut session = self.lock_session();
        match result {
            Ok(text) => {
                let reply = session.push(Role::Assistant, text);
                SendOutcome::Replied { user, reply }
            }
            Err(error) => {
                warn!(session_id = %session.id, error = %error, "Responder failed");
                Self::substitute(&mut session, user, error)
            }
        }
    }

    fn substitute(session: &mut Session, user: Message, error: ResponderError) -> SendOutcome {
        let fallback = session.push(Role::Assistant, FALLBACK_ERROR_TEXT.to_string());
        SendOutcome::Failed {
            user,
            fallback,
            error,
        }
    }

    /// Snapshot of the transcript.
    pub fn history(&self) -> Vec<Message> {
        self.lock_session().history()
    }

    /// Whether a send is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Watch the pending flag change.
    pub fn subscribe_pending(&self) -> watch::Receiver<bool> {
        self.pending_tx.subscribe()
    }

    pub fn session_id(&self) -> String {
        self.lock_session().id.clone()
    }

    /// Copy of the session, e.g. for saving.
    pub fn snapshot(&self) -> Session {
        self.lock_session().clone()
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// End the controller and hand back the session.
    pub fn into_session(self) -> Session {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the pending flag for the duration of one send.
///
/// Dropping the guard clears the flag on every exit path, including when the
/// send future is dropped mid-await.
struct PendingGuard<'a> {
    flag: &'a AtomicBool,
    tx: &'a watch::Sender<bool>,
}

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool, tx: &'a watch::Sender<bool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        tx.send_replace(true);
        Some(Self { flag, tx })
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.tx.send_replace(false);
    }
}
