//! Workflow run results and progress events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::change::FileChange;
use super::policy::MergeDecision;
use super::validation::ValidationResult;

/// Workflow step reported in progress events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Analyze,
    Generate,
    Apply,
    Validate,
    Retry,
    Decide,
    Branch,
    Commit,
    Push,
    PullRequest,
    CiWait,
    Merge,
    Done,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Analyze => "analyze",
            WorkflowStep::Generate => "generate",
            WorkflowStep::Apply => "apply",
            WorkflowStep::Validate => "validate",
            WorkflowStep::Retry => "retry",
            WorkflowStep::Decide => "decide",
            WorkflowStep::Branch => "branch",
            WorkflowStep::Commit => "commit",
            WorkflowStep::Push => "push",
            WorkflowStep::PullRequest => "pull_request",
            WorkflowStep::CiWait => "ci_wait",
            WorkflowStep::Merge => "merge",
            WorkflowStep::Done => "done",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status attached to a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

/// Structured progress event emitted by every workflow step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub run_id: String,
    pub step: WorkflowStep,
    pub status: StepStatus,
    pub message: String,
    pub data: Value,
}

/// Outcome of one external-facing phase (branch, commit, push, pr).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseOutcome {
    pub success: bool,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl PhaseOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: Some(detail.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: None,
            error: Some(error.into()),
        }
    }
}

/// Reference to an opened pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    pub head_branch: String,
    pub head_sha: String,
}

/// How the run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing to fix, or no fix could be produced.
    Aborted,
    /// Dry run: stopped before any PR.
    DryRun,
    /// PR opened and left for review or pending CI.
    PullRequestOpened,
    /// PR merged after CI passed.
    Merged,
    /// An external phase failed.
    Failed,
    Cancelled,
}

/// Final result of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowResult {
    pub run_id: String,
    pub external_id: String,
    pub outcome: RunOutcome,
    /// Human-readable reason; never a raw error chain.
    pub message: String,
    pub attempts: u32,
    pub errors_found: usize,
    pub changes: Vec<FileChange>,
    pub validation: Option<ValidationResult>,
    pub decision: Option<MergeDecision>,
    pub branch: Option<PhaseOutcome>,
    pub commit: Option<PhaseOutcome>,
    pub push: Option<PhaseOutcome>,
    pub pr: Option<PhaseOutcome>,
    pub merge: Option<PhaseOutcome>,
    pub pull_request: Option<PullRequestRef>,
}

impl WorkflowResult {
    pub fn new(run_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            external_id: external_id.into(),
            outcome: RunOutcome::Aborted,
            message: String::new(),
            attempts: 0,
            errors_found: 0,
            changes: Vec::new(),
            validation: None,
            decision: None,
            branch: None,
            commit: None,
            push: None,
            pr: None,
            merge: None,
            pull_request: None,
        }
    }

    pub fn finish(mut self, outcome: RunOutcome, message: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.message = message.into();
        self
    }

    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::DryRun | RunOutcome::PullRequestOpened | RunOutcome::Merged
        )
    }
}
