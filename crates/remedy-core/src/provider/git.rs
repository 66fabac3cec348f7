//! Abstract git hosting provider.
//!
//! Implementations must make `create_branch` and `create_pr` idempotent:
//! an existing branch is reused and an existing open PR for the same head
//! branch is returned instead of opening a second one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{PullRequestRef, RepositoryRef, Result};

/// Request to open a pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequestRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrStatus {
    pub number: u64,
    pub state: PrState,
    pub head_sha: String,
    pub mergeable: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    #[default]
    Squash,
    Merge,
    Rebase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
}

/// One CI check run attached to a commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
}

impl CheckRun {
    pub fn completed(name: impl Into<String>, conclusion: CheckConclusion) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Completed,
            conclusion: Some(conclusion),
        }
    }

    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::InProgress,
            conclusion: None,
        }
    }
}

/// Aggregate CI state for a commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Pending,
    Passed,
    Failed,
}

impl CiStatus {
    /// Fold check runs: any failing conclusion fails, any unfinished check
    /// is pending, no checks at all is pending.
    pub fn aggregate(checks: &[CheckRun]) -> Self {
        if checks.is_empty() {
            return CiStatus::Pending;
        }
        let failed = checks.iter().any(|c| {
            matches!(
                c.conclusion,
                Some(CheckConclusion::Failure | CheckConclusion::Cancelled | CheckConclusion::TimedOut)
            )
        });
        if failed {
            return CiStatus::Failed;
        }
        if checks.iter().any(|c| c.status != CheckStatus::Completed) {
            return CiStatus::Pending;
        }
        CiStatus::Passed
    }
}

/// Branch, commit, PR and CI operations against a hosted repository.
#[async_trait]
pub trait GitProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Create `branch` from `base`; no-op when it already exists.
    async fn create_branch(&self, repo: &RepositoryRef, branch: &str, base: &str) -> Result<()>;

    /// Commit `files` on `branch` and return the commit sha.
    async fn commit(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        message: &str,
        files: &[String],
    ) -> Result<String>;

    async fn push(&self, repo: &RepositoryRef, branch: &str) -> Result<()>;

    /// Open a PR, or return the open PR whose head is `request.head`.
    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: &PullRequestRequest,
    ) -> Result<PullRequestRef>;

    async fn get_pr_status(&self, repo: &RepositoryRef, number: u64) -> Result<PrStatus>;

    async fn merge_pr(
        &self,
        repo: &RepositoryRef,
        number: u64,
        method: MergeMethod,
        delete_branch: bool,
    ) -> Result<()>;

    async fn list_checks(&self, repo: &RepositoryRef, sha: &str) -> Result<Vec<CheckRun>>;
}
