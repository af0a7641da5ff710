//! Session persistence for parley.
//!
//! Saves session snapshots with atomic writes and schema versioning, and
//! tracks which session the CLI should resume.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing::warn;

use crate::session::Session;

/// Current schema version for session persistence.
const CURRENT_SCHEMA_VERSION: u32 = 1;

const SESSION_FILE: &str = "session.json";
const ACTIVE_FILE: &str = "active_session";

/// Error type for persistence operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid session data: {0}")]
    InvalidData(String),

    #[error("Unsupported schema version: {0} (max supported: {1})")]
    UnsupportedSchema(u32, u32),

    #[error("Invalid session ID: {0}")]
    InvalidId(String),
}

/// Summary info for listing sessions without keeping transcripts around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// On-disk format with schema versioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    schema_version: u32,
    #[serde(flatten)]
    session: Session,
}

/// Manages session persistence under a base directory.
pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    /// Create a new `SessionStore`.
    /// Creates the sessions directory if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let base_path = base_path.into();
        fs::create_dir_all(base_path.join("sessions"))?;
        Ok(Self { base_path })
    }

    /// Open a store without touching the filesystem.
    /// Read operations on a missing directory behave like an empty store.
    pub fn open(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Save a session with atomic write pattern.
    pub fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        Self::validate_id(&session.id)?;

        let session_dir = self.session_dir(&session.id);
        fs::create_dir_all(&session_dir)?;

        let file = SessionFile {
            schema_version: CURRENT_SCHEMA_VERSION,
            session: session.clone(),
        };

        let json = serde_json::to_string_pretty(&file)?;
        atomic_write(&session_dir.join(SESSION_FILE), json.as_bytes())?;

        Ok(())
    }

    /// Load a session by ID.
    pub fn load(&self, id: &str) -> Result<Session, PersistenceError> {
        Self::validate_id(id)?;

        let path = self.session_dir(id).join(SESSION_FILE);
        if !path.exists() {
            return Err(PersistenceError::SessionNotFound(id.to_string()));
        }

        let content = fs::read_to_string(&path)?;

        // Check the version before committing to the current layout
        let raw: serde_json::Value = serde_json::from_str(&content)?;
        let version_u64 = raw
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| PersistenceError::InvalidData("missing schema_version".to_string()))?;
        let version = u32::try_from(version_u64).map_err(|_| {
            PersistenceError::InvalidData("schema_version too large".to_string())
        })?;

        if version > CURRENT_SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedSchema(
                version,
                CURRENT_SCHEMA_VERSION,
            ));
        }

        let file: SessionFile = serde_json::from_value(raw)?;
        if file.session.id != id {
            return Err(PersistenceError::InvalidData(format!(
                "session file for {id} contains id {}",
                file.session.id
            )));
        }

        Ok(file.session)
    }

    /// Check if a session exists and can be loaded.
    pub fn exists(&self, id: &str) -> bool {
        if Self::validate_id(id).is_err() {
            return false;
        }
        self.load(id).is_ok()
    }

    /// List all sessions with summary info.
    /// Sorted by `updated_at` descending (most recent first).
    pub fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
        let sessions_dir = self.base_path.join("sessions");
        if !sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let active_id = self.get_active()?.unwrap_or_default();

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&sessions_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }

            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match self.load(id) {
                Ok(session) => summaries.push(SessionSummary {
                    is_active: session.id == active_id,
                    id: session.id.clone(),
                    title: session.title.clone(),
                    message_count: session.messages().len(),
                    updated_at: session.updated_at,
                }),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Skipping corrupted session");
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(summaries)
    }

    /// Get the active session ID, if any.
    pub fn get_active(&self) -> Result<Option<String>, PersistenceError> {
        let path = self.base_path.join(ACTIVE_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let id = content.trim();

        if id.is_empty() || !self.exists(id) {
            return Ok(None);
        }

        Ok(Some(id.to_string()))
    }

    /// Set the active session ID.
    pub fn set_active(&self, id: &str) -> Result<(), PersistenceError> {
        Self::validate_id(id)?;

        if !self.exists(id) {
            return Err(PersistenceError::SessionNotFound(id.to_string()));
        }

        atomic_write(&self.base_path.join(ACTIVE_FILE), id.as_bytes())?;
        Ok(())
    }

    /// Clear the active session.
    pub fn clear_active(&self) -> Result<(), PersistenceError> {
        let path = self.base_path.join(ACTIVE_FILE);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Load the active session, if one is set and loadable.
    pub fn load_active(&self) -> Result<Option<Session>, PersistenceError> {
        match self.get_active()? {
            Some(id) => Ok(Some(self.load(&id)?)),
            None => Ok(None),
        }
    }

    /// Validate a session ID for filesystem safety.
    fn validate_id(id: &str) -> Result<(), PersistenceError> {
        if id.is_empty() {
            return Err(PersistenceError::InvalidId("ID cannot be empty".to_string()));
        }

        if id.contains('/') || id.contains('\\') {
            return Err(PersistenceError::InvalidId(
                "ID cannot contain path separators".to_string(),
            ));
        }

        if id.contains("..") {
            return Err(PersistenceError::InvalidId(
                "ID cannot contain path traversal".to_string(),
            ));
        }

        for ch in id.chars() {
            if !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_' {
                return Err(PersistenceError::InvalidId(format!(
                    "ID contains invalid character: {ch}"
                )));
            }
        }

        Ok(())
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.base_path.join("sessions").join(id)
    }
}

/// Write content atomically using temp file + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let pid = std::process::id();

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let tmp_path = path.with_file_name(format!("{file_name}.{timestamp}.{pid}.tmp"));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        // Best-effort cleanup
        let _ = fs::remove_file(&tmp_path);
    }

    result
}
