//! [`ValidationTools`] backed by external commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use remedy_core::provider::{ToolOutcome, ValidationTools};
use remedy_core::{ErrorClassifier, ParsedError, RemedyError, Result, Severity, StageKind};
use tracing::{debug, info};

use crate::detect::detect_toolchain;
use crate::runner::{CommandOutput, CommandRunner};
use crate::stage::{CommandSet, StageCommand, Toolchain};

/// Lines of raw output kept when nothing in a failing run classifies.
const RAW_TAIL_LINES: usize = 20;

/// Runs the configured commands in the project root and classifies their
/// output into stage errors and warnings.
pub struct CommandValidationTools {
    commands: CommandSet,
    classifier: Arc<ErrorClassifier>,
    timeout: Option<Duration>,
}

impl CommandValidationTools {
    pub fn new(commands: CommandSet, classifier: Arc<ErrorClassifier>) -> Self {
        Self {
            commands,
            classifier,
            timeout: None,
        }
    }

    pub fn for_toolchain(toolchain: Toolchain, classifier: Arc<ErrorClassifier>) -> Self {
        Self::new(toolchain.preset(), classifier)
    }

    /// Preset for the toolchain detected under `root`, if any.
    pub fn detect(root: &Path, classifier: Arc<ErrorClassifier>) -> Option<Self> {
        let toolchain = detect_toolchain(root)?;
        info!(root = %root.display(), toolchain = %toolchain, "detected project toolchain");
        Some(Self::for_toolchain(toolchain, classifier))
    }

    /// Kill each command after `timeout`. The validation pipeline applies
    /// its own stage timeouts; this bounds direct use.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    async fn run(
        &self,
        stage: StageKind,
        command: Option<&StageCommand>,
        root: &Path,
        files: &[String],
    ) -> Result<ToolOutcome> {
        let command = command.ok_or_else(|| RemedyError::ValidationTool {
            tool: stage.to_string(),
            reason: "no command configured".to_string(),
        })?;
        let argv = command.argv(files);
        let output = CommandRunner::execute(&argv, root, self.timeout).await?;
        let outcome = self.outcome(stage, &output);
        debug!(
            stage = %stage,
            passed = outcome.passed,
            errors = outcome.errors.len(),
            warnings = outcome.warnings.len(),
            "tool output classified"
        );
        Ok(outcome)
    }

    fn outcome(&self, stage: StageKind, output: &CommandOutput) -> ToolOutcome {
        let text = output.combined();
        let analysis = self.classifier.parse_errors(&text, &stage.to_string());
        let (blocking, advisory): (Vec<ParsedError>, Vec<ParsedError>) = analysis
            .errors
            .into_iter()
            .partition(|e| matches!(e.severity, Severity::Critical | Severity::Error));

        let warnings = advisory.iter().map(describe).collect();
        if output.passed() {
            return ToolOutcome {
                passed: true,
                errors: Vec::new(),
                warnings,
            };
        }

        let mut errors: Vec<String> = blocking.iter().map(describe).collect();
        if errors.is_empty() {
            errors.push(raw_tail(&text, output.exit_code));
        }
        ToolOutcome {
            passed: false,
            errors,
            warnings,
        }
    }
}

fn describe(error: &ParsedError) -> String {
    match &error.code {
        Some(code) => format!("{}: {} [{}]", error.location, error.message, code),
        None => format!("{}: {}", error.location, error.message),
    }
}

fn raw_tail(text: &str, exit_code: i32) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = &lines[lines.len().saturating_sub(RAW_TAIL_LINES)..];
    if tail.is_empty() {
        format!("exited with code {exit_code}")
    } else {
        format!("exited with code {exit_code}:\n{}", tail.join("\n"))
    }
}

#[async_trait]
impl ValidationTools for CommandValidationTools {
    async fn typecheck(&self, root: &Path, files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Typecheck, self.commands.typecheck.as_ref(), root, files)
            .await
    }

    async fn lint(&self, root: &Path, files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Lint, self.commands.lint.as_ref(), root, files)
            .await
    }

    async fn test(&self, root: &Path, files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Test, self.commands.test.as_ref(), root, files)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(commands: CommandSet) -> CommandValidationTools {
        let classifier = Arc::new(ErrorClassifier::new().expect("classifier"));
        CommandValidationTools::new(commands, classifier)
    }

    fn sh(script: &str) -> Option<StageCommand> {
        Some(StageCommand::new(&["sh", "-c", script]))
    }

    #[test]
    fn test_raw_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = raw_tail(&text, 2);
        assert!(tail.starts_with("exited with code 2:"));
        assert!(tail.contains("line 29"));
        assert!(!tail.contains("line 9\n"));
        assert_eq!(raw_tail("", 1), "exited with code 1");
    }

    #[tokio::test]
    async fn test_failing_typecheck_is_classified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools(CommandSet {
            typecheck: sh(
                "echo \"src/app.ts(2,9): error TS2322: Type 'string' is not assignable to type 'number'.\"; exit 2",
            ),
            ..Default::default()
        });

        let outcome = tools
            .typecheck(dir.path(), &[])
            .await
            .expect("tool ran");
        assert!(!outcome.passed);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("src/app.ts:2:9"));
        assert!(outcome.errors[0].contains("TS2322"));
    }

    #[tokio::test]
    async fn test_unclassified_failure_keeps_raw_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools(CommandSet {
            test: sh("echo 'something odd happened'; exit 1"),
            ..Default::default()
        });
        let outcome = tools.test(dir.path(), &[]).await.expect("tool ran");
        assert!(!outcome.passed);
        assert!(!outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_passing_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools(CommandSet {
            lint: sh("exit 0"),
            ..Default::default()
        });
        let outcome = tools.lint(dir.path(), &[]).await.expect("tool ran");
        assert!(outcome.passed);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_stage_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = tools(CommandSet::default())
            .lint(dir.path(), &[])
            .await
            .expect_err("no command");
        assert!(matches!(err, RemedyError::ValidationTool { .. }));
    }
}
