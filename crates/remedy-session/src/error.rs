//! Session error types.

use remedy_core::RemedyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session {0} has no running process")]
    NotRunning(String),

    #[error("session {0} was reloaded from the store and cannot be restarted")]
    Archived(String),

    #[error("unknown tool profile: {0}")]
    UnknownProfile(String),

    #[error("profile {0} cannot continue a conversation")]
    NoContinuation(String),

    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("signal delivery failed: {0}")]
    Signal(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] RemedyError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for RemedyError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Core(inner) => inner,
            SessionError::Io(e) => RemedyError::Io(e),
            other => RemedyError::Process(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Spawn {
            program: "claude".into(),
            reason: "No such file or directory".into(),
        };
        assert_eq!(err.to_string(), "failed to spawn claude: No such file or directory");
    }

    #[test]
    fn test_into_domain_error() {
        let err: RemedyError = SessionError::NotFound("s-1".into()).into();
        assert!(matches!(err, RemedyError::Process(msg) if msg.contains("s-1")));
    }
}
