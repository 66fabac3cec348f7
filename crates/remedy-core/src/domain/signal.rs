//! Incoming failure signals, as produced by source-specific webhook adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Repository the failure belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
    /// Branch pull requests target.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Local checkout that fixes are applied to.
    pub local_path: PathBuf,
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl RepositoryRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A raw failure signal: CI log, build error, runtime exception or alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureSignal {
    /// External id (webhook delivery, deployment id, alert id). Runs are
    /// keyed by it.
    pub id: String,

    /// Signal origin, e.g. `github`, `vercel`, `sentry`, `supabase`.
    pub source: String,

    #[serde(default)]
    pub subtype: Option<String>,

    /// Raw log text (JSON string) or structured alert payload.
    pub raw_payload: Value,

    pub repository: RepositoryRef,

    /// Optional human or upstream hint carried into fix prompts.
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl FailureSignal {
    /// Build a signal from plain log text.
    pub fn from_log(
        id: impl Into<String>,
        source: impl Into<String>,
        log: impl Into<String>,
        repository: RepositoryRef,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            subtype: None,
            raw_payload: Value::String(log.into()),
            repository,
            suggestion: None,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}
