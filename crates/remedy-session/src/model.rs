//! Session records, turns and events.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buffer::OutputChunk;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Running,
    /// Ended by `stop`.
    Stopped,
    /// Non-zero exit, signal, or spawn failure.
    Failed,
    /// Exited with code zero.
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Stopped | SessionStatus::Failed | SessionStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the append-only conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Persisted state of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub profile_id: String,
    /// Change or run this session works on.
    #[serde(default)]
    pub change_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    pub status: SessionStatus,
    /// Why the last process ended, for non-zero exits and signals.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Processes spawned for this session so far.
    #[serde(default)]
    pub spawn_count: u32,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.history.iter().rev().find(|t| t.role == Role::Assistant)
    }
}

/// Broadcast to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Output {
        session_id: String,
        chunk: OutputChunk,
    },
    Status {
        session_id: String,
        status: SessionStatus,
    },
    /// Exactly one per process exit.
    Ended {
        session_id: String,
        status: SessionStatus,
        message: Option<String>,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Output { session_id, .. }
            | SessionEvent::Status { session_id, .. }
            | SessionEvent::Ended { session_id, .. } => session_id,
        }
    }
}
