//! Domain-level error taxonomy for Remedy.

/// Remedy domain errors.
///
/// Per-file and per-stage failures are normally collected into aggregate
/// results; these errors surface only when an operation cannot produce any
/// result at all.
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    #[error("generation failed: {message}")]
    Generation { message: String, retryable: bool },

    #[error("cannot apply change to {path}: {reason}")]
    Application { path: String, reason: String },

    #[error("validation tool '{tool}' unavailable: {reason}")]
    ValidationTool { tool: String, reason: String },

    #[error("process error: {0}")]
    Process(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("run already in progress for {0}")]
    RunInProgress(String),

    #[error("run capacity exhausted ({capacity} concurrent runs)")]
    RunCapacity { capacity: usize },

    #[error("rollback not found: {0}")]
    RollbackNotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemedyError {
    /// Shorthand for a generation failure.
    pub fn generation(message: impl Into<String>, retryable: bool) -> Self {
        Self::Generation {
            message: message.into(),
            retryable,
        }
    }

    /// Shorthand for a per-file application failure.
    pub fn application(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Application {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation may succeed (rate limit, timeout, 5xx).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemedyError::Generation {
                retryable: true,
                ..
            }
        )
    }
}

/// Result type for Remedy domain operations.
pub type Result<T> = std::result::Result<T, RemedyError>;
