//! Git provider backed by the local `git` CLI.
//!
//! Covers branch, commit and push against the repository's local checkout.
//! Pull requests and checks need a hosting API and report
//! [`RemedyError::Unsupported`].

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{PullRequestRef, RemedyError, RepositoryRef, Result};
use crate::provider::{CheckRun, GitProvider, MergeMethod, PrStatus, PullRequestRequest};

async fn git(dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RemedyError::Git(format!("failed to run git: {e}")))
}

async fn git_checked(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RemedyError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn ref_exists(dir: &Path, reference: &str) -> Result<bool> {
    Ok(git(dir, &["rev-parse", "--verify", "--quiet", reference])
        .await?
        .status
        .success())
}

/// Capture the HEAD commit sha of the checkout at `dir`.
pub async fn capture_head_sha(dir: &Path) -> Result<String> {
    let sha = git_checked(dir, &["rev-parse", "HEAD"]).await?;
    if sha.is_empty() {
        return Err(RemedyError::Git("git rev-parse HEAD returned empty output".into()));
    }
    Ok(sha)
}

/// Git provider operating on `RepositoryRef::local_path`.
#[derive(Debug, Clone)]
pub struct LocalGitProvider {
    remote: String,
}

impl LocalGitProvider {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }
}

impl Default for LocalGitProvider {
    fn default() -> Self {
        Self::new("origin")
    }
}

#[async_trait]
impl GitProvider for LocalGitProvider {
    fn name(&self) -> &str {
        "local-git"
    }

    /// Check out `branch`, creating it from `base` (or HEAD when `base` is
    /// not known locally). Uncommitted changes carry over.
    async fn create_branch(&self, repo: &RepositoryRef, branch: &str, base: &str) -> Result<()> {
        let dir = &repo.local_path;
        if ref_exists(dir, &format!("refs/heads/{branch}")).await? {
            debug!(branch, "branch exists, checking out");
            git_checked(dir, &["checkout", branch]).await?;
            return Ok(());
        }
        if ref_exists(dir, base).await? {
            git_checked(dir, &["checkout", "-b", branch, base]).await?;
        } else {
            git_checked(dir, &["checkout", "-b", branch]).await?;
        }
        Ok(())
    }

    /// Stage `files` and commit. With nothing staged the current HEAD is
    /// returned.
    async fn commit(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        message: &str,
        files: &[String],
    ) -> Result<String> {
        let dir = &repo.local_path;
        let current = git_checked(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if current != branch {
            git_checked(dir, &["checkout", branch]).await?;
        }

        let mut add = vec!["add", "--"];
        add.extend(files.iter().map(String::as_str));
        git_checked(dir, &add).await?;

        let nothing_staged = git(dir, &["diff", "--cached", "--quiet"]).await?.status.success();
        if nothing_staged {
            debug!(branch, "nothing to commit, reusing HEAD");
        } else {
            git_checked(dir, &["commit", "-m", message]).await?;
        }
        capture_head_sha(dir).await
    }

    async fn push(&self, repo: &RepositoryRef, branch: &str) -> Result<()> {
        git_checked(&repo.local_path, &["push", "-u", &self.remote, branch]).await?;
        Ok(())
    }

    async fn create_pr(
        &self,
        _repo: &RepositoryRef,
        _request: &PullRequestRequest,
    ) -> Result<PullRequestRef> {
        Err(RemedyError::Unsupported("local git cannot open pull requests".into()))
    }

    async fn get_pr_status(&self, _repo: &RepositoryRef, _number: u64) -> Result<PrStatus> {
        Err(RemedyError::Unsupported("local git has no pull requests".into()))
    }

    async fn merge_pr(
        &self,
        _repo: &RepositoryRef,
        _number: u64,
        _method: MergeMethod,
        _delete_branch: bool,
    ) -> Result<()> {
        Err(RemedyError::Unsupported("local git cannot merge pull requests".into()))
    }

    async fn list_checks(&self, _repo: &RepositoryRef, _sha: &str) -> Result<Vec<CheckRun>> {
        Err(RemedyError::Unsupported("local git has no CI checks".into()))
    }
}
