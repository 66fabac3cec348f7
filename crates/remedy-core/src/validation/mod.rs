//! ValidationPipeline: staged checks with fail-fast and scoring.
//!
//! Stages run in order `syntax -> typecheck -> lint -> test`, truncated to
//! the requested level. A failing non-lint stage stops the pipeline. Each
//! stage runs under its own timeout. A timeout or a tool error fails the
//! stage; only a tool that cannot be invoked skips it.

pub mod syntax;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{
    FileChange, RemedyError, Result, StageKind, StageResult, ValidationLevel, ValidationResult,
};
use crate::provider::{ToolOutcome, ValidationTools};

/// Per-stage timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub syntax_timeout_secs: u64,
    pub typecheck_timeout_secs: u64,
    pub lint_timeout_secs: u64,
    pub test_timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            syntax_timeout_secs: 30,
            typecheck_timeout_secs: 300,
            lint_timeout_secs: 180,
            test_timeout_secs: 600,
        }
    }
}

impl ValidationConfig {
    pub fn timeout_for(&self, stage: StageKind) -> Duration {
        let secs = match stage {
            StageKind::Syntax => self.syntax_timeout_secs,
            StageKind::Typecheck => self.typecheck_timeout_secs,
            StageKind::Lint => self.lint_timeout_secs,
            StageKind::Test => self.test_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

pub struct ValidationPipeline {
    tools: Arc<dyn ValidationTools>,
    config: ValidationConfig,
}

impl ValidationPipeline {
    pub fn new(tools: Arc<dyn ValidationTools>, config: ValidationConfig) -> Self {
        Self { tools, config }
    }

    /// Validate `changes`, already written under `root`, up to `level`.
    pub async fn validate_fix(
        &self,
        changes: &[FileChange],
        root: &Path,
        level: ValidationLevel,
    ) -> ValidationResult {
        let started = Instant::now();
        let files: Vec<String> = changes.iter().map(|c| c.path.clone()).collect();
        let mut stages = Vec::new();

        for &stage in level.stages() {
            let result = self.run_stage(stage, changes, root, &files).await;
            info!(
                stage = %stage,
                passed = result.passed,
                skipped = result.skipped,
                errors = result.errors.len(),
                duration_ms = result.duration_ms,
                "validation stage finished"
            );
            let stop = !result.passed && !stage.is_advisory();
            stages.push(result);
            if stop {
                debug!(stage = %stage, "stopping validation after failed stage");
                break;
            }
        }

        ValidationResult::from_stages(stages, started.elapsed().as_millis() as u64)
    }

    async fn run_stage(
        &self,
        stage: StageKind,
        changes: &[FileChange],
        root: &Path,
        files: &[String],
    ) -> StageResult {
        let started = Instant::now();
        let timeout = self.config.timeout_for(stage);
        let outcome = tokio::time::timeout(timeout, self.invoke(stage, changes, root, files)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => StageResult {
                stage,
                passed: false,
                skipped: false,
                errors: vec![format!("{stage} timed out after {}s", timeout.as_secs())],
                warnings: Vec::new(),
                duration_ms,
            },
            Ok(Err(e @ RemedyError::ValidationTool { .. })) => {
                warn!(stage = %stage, error = %e, "validation tool unavailable, skipping stage");
                StageResult::skipped(stage, format!("{stage} skipped: {e}"), duration_ms)
            }
            Ok(Err(e)) => {
                warn!(stage = %stage, error = %e, "validation tool failed");
                StageResult {
                    stage,
                    passed: false,
                    skipped: false,
                    errors: vec![format!("{stage} failed: {e}")],
                    warnings: Vec::new(),
                    duration_ms,
                }
            }
            Ok(Ok(ToolOutcome {
                passed,
                errors,
                warnings,
            })) => StageResult {
                stage,
                passed,
                skipped: false,
                errors,
                warnings,
                duration_ms,
            },
        }
    }

    async fn invoke(
        &self,
        stage: StageKind,
        changes: &[FileChange],
        root: &Path,
        files: &[String],
    ) -> Result<ToolOutcome> {
        match stage {
            StageKind::Syntax => Ok(syntax::check_changes(changes)),
            StageKind::Typecheck => self.tools.typecheck(root, files).await,
            StageKind::Lint => self.tools.lint(root, files).await,
            StageKind::Test => self.tools.test(root, files).await,
        }
    }
}
