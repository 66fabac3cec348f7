//! Polling a pull request's checks until they settle.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::RepositoryRef;
use crate::provider::{CheckConclusion, CheckRun, CiStatus, GitProvider};

/// How a CI wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiWaitOutcome {
    Passed,
    /// Names of the failing checks.
    Failed(Vec<String>),
    TimedOut,
    Cancelled,
}

/// Poll `list_checks` for `sha` every `interval` until the aggregate status
/// settles, `timeout` elapses, or `cancel` fires.
///
/// Errors from the provider are logged and treated as still pending.
pub async fn wait_for_ci(
    git: &dyn GitProvider,
    repo: &RepositoryRef,
    sha: &str,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> CiWaitOutcome {
    let poll = async {
        let mut polls = 0u32;
        loop {
            polls += 1;
            match git.list_checks(repo, sha).await {
                Ok(checks) => match CiStatus::aggregate(&checks) {
                    CiStatus::Passed => return CiWaitOutcome::Passed,
                    CiStatus::Failed => return CiWaitOutcome::Failed(failing_checks(&checks)),
                    CiStatus::Pending => {
                        debug!(sha, polls, checks = checks.len(), "CI still pending");
                    }
                },
                Err(e) => warn!(sha, polls, error = %e, "listing checks failed"),
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => CiWaitOutcome::Cancelled,
        _ = tokio::time::sleep(timeout) => CiWaitOutcome::TimedOut,
        outcome = poll => outcome,
    }
}

fn failing_checks(checks: &[CheckRun]) -> Vec<String> {
    checks
        .iter()
        .filter(|c| {
            matches!(
                c.conclusion,
                Some(CheckConclusion::Failure | CheckConclusion::Cancelled | CheckConclusion::TimedOut)
            )
        })
        .map(|c| c.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingGitProvider;

    fn repo() -> RepositoryRef {
        RepositoryRef {
            owner: "acme".into(),
            name: "web".into(),
            base_branch: "main".into(),
            local_path: "/tmp/web".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_through_pending_polls() {
        let git = RecordingGitProvider::new().with_checks(vec![
            vec![CheckRun::pending("build")],
            vec![CheckRun::pending("build")],
            vec![CheckRun::completed("build", CheckConclusion::Success)],
        ]);
        let outcome = wait_for_ci(
            &git,
            &repo(),
            "abc",
            Duration::from_secs(30),
            Duration::from_secs(600),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, CiWaitOutcome::Passed);
        let polls = git.calls().iter().filter(|c| *c == "list_checks").count();
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_checks_named() {
        let git = RecordingGitProvider::new().with_checks(vec![vec![
            CheckRun::completed("build", CheckConclusion::Success),
            CheckRun::completed("e2e", CheckConclusion::Failure),
        ]]);
        let outcome = wait_for_ci(
            &git,
            &repo(),
            "abc",
            Duration::from_secs(30),
            Duration::from_secs(600),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, CiWaitOutcome::Failed(vec!["e2e".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_checks_never_settle() {
        let git = RecordingGitProvider::new().with_checks(vec![vec![CheckRun::pending("build")]]);
        let outcome = wait_for_ci(
            &git,
            &repo(),
            "abc",
            Duration::from_secs(30),
            Duration::from_secs(120),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, CiWaitOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_wait() {
        let git = RecordingGitProvider::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = wait_for_ci(
            &git,
            &repo(),
            "abc",
            Duration::from_secs(30),
            Duration::from_secs(600),
            &cancel,
        )
        .await;
        assert_eq!(outcome, CiWaitOutcome::Cancelled);
    }
}
