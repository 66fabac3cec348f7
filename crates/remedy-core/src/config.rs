//! Configuration, loaded from TOML. Every field has a default, so an empty
//! file (or no file) is a valid configuration.
//!
//! ```toml
//! [workflow]
//! max_retries = 2
//! dry_run = true
//!
//! [[policies]]
//! source = "github"
//! auto_merge = false
//! requires_ci_pass = true
//! requires_manual_approval = true
//! minimum_confidence = 0.9
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierConfig;
use crate::domain::{MergePolicy, RemedyError, Result, ValidationLevel};
use crate::fixer::GenerationConfig;
use crate::merge_policy::PolicyTable;
use crate::provider::BackoffConfig;
use crate::validation::ValidationConfig;

/// Workflow engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Validation attempts per run, including the first.
    pub max_retries: u32,
    /// Error budget per run; extra errors are dropped by priority.
    pub max_errors: usize,
    pub validation_level: ValidationLevel,
    /// Stop before any branch or PR is created.
    pub dry_run: bool,
    pub branch_prefix: String,
    /// Overrides the repository's base branch when set.
    pub base_branch: Option<String>,
    pub pr_labels: Vec<String>,
    /// Added to PRs whose validation never passed.
    pub manual_review_label: String,
    pub ci_poll_interval_secs: u64,
    pub ci_timeout_secs: u64,
    /// Character cap on retry analysis appended to the suggestion. The most
    /// recent text is kept. Unset means unbounded.
    pub retry_context_cap: Option<usize>,
    pub max_concurrent_runs: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_errors: 10,
            validation_level: ValidationLevel::Full,
            dry_run: false,
            branch_prefix: "auto-fix/".to_string(),
            base_branch: None,
            pr_labels: vec!["auto-fix".to_string(), "automated".to_string()],
            manual_review_label: "needs-review".to_string(),
            ci_poll_interval_secs: 30,
            ci_timeout_secs: 1800,
            retry_context_cap: None,
            max_concurrent_runs: 8,
        }
    }
}

impl WorkflowConfig {
    pub fn ci_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ci_poll_interval_secs)
    }

    pub fn ci_timeout(&self) -> Duration {
        Duration::from_secs(self.ci_timeout_secs)
    }
}

/// Process session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionsConfig {
    /// Directory for the session store; unset keeps sessions in memory.
    pub store_dir: Option<PathBuf>,
    /// Output chunks kept per session before the oldest are evicted.
    pub output_buffer_chunks: usize,
    /// Grace period between SIGTERM and SIGKILL on a graceful stop.
    pub stop_grace_secs: u64,
    /// Profile used by the session-backed generation provider.
    pub default_profile: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            output_buffer_chunks: 2048,
            stop_grace_secs: 5,
            default_profile: "claude".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemedyConfig {
    pub workflow: WorkflowConfig,
    pub classifier: ClassifierConfig,
    pub validation: ValidationConfig,
    pub generation: GenerationConfig,
    pub sessions: SessionsConfig,
    /// Added to, or replacing entries of, the built-in policy table.
    pub policies: Vec<MergePolicy>,
}

impl RemedyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RemedyError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RemedyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Built-in policies with the configured overrides applied.
    pub fn policy_table(&self) -> PolicyTable {
        self.policies
            .iter()
            .cloned()
            .fold(PolicyTable::standard(), PolicyTable::with_policy)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.workflow;
        if w.max_concurrent_runs == 0 {
            return Err(RemedyError::Config("workflow.max_concurrent_runs must be > 0".into()));
        }
        if w.ci_poll_interval_secs == 0 {
            return Err(RemedyError::Config("workflow.ci_poll_interval_secs must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.classifier.auto_fix_threshold) {
            return Err(RemedyError::Config(
                "classifier.auto_fix_threshold must be within [0, 1]".into(),
            ));
        }
        let backoff = &self.generation.backoff;
        if backoff.max_retries > BackoffConfig::MAX_RETRIES {
            return Err(RemedyError::Config(format!(
                "generation.backoff.max_retries must be <= {}",
                BackoffConfig::MAX_RETRIES
            )));
        }
        if backoff.max_delay_ms < backoff.base_delay_ms {
            return Err(RemedyError::Config(
                "generation.backoff.max_delay_ms must be >= base_delay_ms".into(),
            ));
        }
        for policy in &self.policies {
            if !(0.0..=1.0).contains(&policy.gates.minimum_confidence) {
                return Err(RemedyError::Config(format!(
                    "policy {}: minimum_confidence must be within [0, 1]",
                    policy.label()
                )));
            }
        }
        Ok(())
    }
}
