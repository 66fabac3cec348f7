//! In-memory fakes for the provider traits (testing only).
//!
//! `ScriptedProvider`, `RecordingGitProvider` and `ScriptedValidationTools`
//! satisfy the trait contracts without network access or subprocesses.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{PullRequestRef, RemedyError, RepositoryRef, Result, StageKind};
use crate::provider::{
    CheckRun, Generation, GenerationOptions, GenerationProvider, GitProvider, MergeMethod,
    PrState, PrStatus, PullRequestRequest, ToolOutcome, Usage, ValidationTools,
};

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

/// Generation provider answering from a fixed script, recording prompts.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every prompt with the same text.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(text.to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<Generation> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(Generation {
                usage: Usage {
                    input_tokens: prompt.len() as u64,
                    output_tokens: text.len() as u64,
                },
                text,
            }),
            Some(Err(e)) => Err(e),
            None => Err(RemedyError::generation("script exhausted", false)),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingGitProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GitState {
    calls: Vec<String>,
    branches: HashSet<String>,
    prs: HashMap<String, PullRequestRef>,
    pr_requests: Vec<PullRequestRequest>,
    merged: Vec<u64>,
    commits: u64,
}

/// Git provider that records calls and serves scripted CI checks.
///
/// Branches and PRs are idempotent per the [`GitProvider`] contract. Check
/// polls pop from the script; the last entry repeats once it is exhausted.
#[derive(Debug, Default)]
pub struct RecordingGitProvider {
    state: Mutex<GitState>,
    checks: Mutex<VecDeque<Vec<CheckRun>>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingGitProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checks(self, polls: Vec<Vec<CheckRun>>) -> Self {
        *self.checks.lock().unwrap() = polls.into();
        self
    }

    /// Make every call of `operation` (e.g. `"push"`) fail.
    pub fn failing(self, operation: &str) -> Self {
        *self.fail_on.lock().unwrap() = Some(operation.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn merged(&self) -> Vec<u64> {
        self.state.lock().unwrap().merged.clone()
    }

    pub fn pr_requests(&self) -> Vec<PullRequestRequest> {
        self.state.lock().unwrap().pr_requests.clone()
    }

    fn record(&self, operation: &str) -> Result<()> {
        self.state.lock().unwrap().calls.push(operation.to_string());
        if self.fail_on.lock().unwrap().as_deref() == Some(operation) {
            return Err(RemedyError::Git(format!("{operation} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl GitProvider for RecordingGitProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn create_branch(&self, _repo: &RepositoryRef, branch: &str, _base: &str) -> Result<()> {
        self.record("create_branch")?;
        self.state.lock().unwrap().branches.insert(branch.to_string());
        Ok(())
    }

    async fn commit(
        &self,
        _repo: &RepositoryRef,
        branch: &str,
        _message: &str,
        _files: &[String],
    ) -> Result<String> {
        self.record("commit")?;
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains(branch) {
            return Err(RemedyError::Git(format!("unknown branch {branch}")));
        }
        state.commits += 1;
        Ok(format!("{:040x}", state.commits))
    }

    async fn push(&self, _repo: &RepositoryRef, _branch: &str) -> Result<()> {
        self.record("push")
    }

    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: &PullRequestRequest,
    ) -> Result<PullRequestRef> {
        self.record("create_pr")?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.prs.get(&request.head) {
            return Ok(existing.clone());
        }
        let number = state.prs.len() as u64 + 1;
        let pr = PullRequestRef {
            number,
            url: format!("https://git.example/{}/pull/{number}", repo.full_name()),
            head_branch: request.head.clone(),
            head_sha: format!("{:040x}", state.commits),
        };
        state.prs.insert(request.head.clone(), pr.clone());
        state.pr_requests.push(request.clone());
        Ok(pr)
    }

    async fn get_pr_status(&self, _repo: &RepositoryRef, number: u64) -> Result<PrStatus> {
        self.record("get_pr_status")?;
        let state = self.state.lock().unwrap();
        let pr = state
            .prs
            .values()
            .find(|pr| pr.number == number)
            .ok_or_else(|| RemedyError::Git(format!("no pull request #{number}")))?;
        let merged = state.merged.contains(&number);
        Ok(PrStatus {
            number,
            state: if merged { PrState::Merged } else { PrState::Open },
            head_sha: pr.head_sha.clone(),
            mergeable: Some(!merged),
        })
    }

    async fn merge_pr(
        &self,
        _repo: &RepositoryRef,
        number: u64,
        _method: MergeMethod,
        delete_branch: bool,
    ) -> Result<()> {
        self.record("merge_pr")?;
        let mut state = self.state.lock().unwrap();
        if !state.merged.contains(&number) {
            state.merged.push(number);
        }
        if delete_branch {
            let head = state
                .prs
                .values()
                .find(|pr| pr.number == number)
                .map(|pr| pr.head_branch.clone());
            if let Some(head) = head {
                state.branches.remove(&head);
            }
        }
        Ok(())
    }

    async fn list_checks(&self, _repo: &RepositoryRef, _sha: &str) -> Result<Vec<CheckRun>> {
        self.record("list_checks")?;
        let mut checks = self.checks.lock().unwrap();
        if checks.len() > 1 {
            return Ok(checks.pop_front().unwrap_or_default());
        }
        Ok(checks.front().cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ScriptedValidationTools
// ---------------------------------------------------------------------------

/// Validation tools answering per stage from a script.
///
/// A stage with no scripted entries passes. A stage marked as hanging
/// sleeps for the given duration before passing.
#[derive(Debug, Default)]
pub struct ScriptedValidationTools {
    scripts: Mutex<HashMap<StageKind, VecDeque<Result<ToolOutcome>>>>,
    hangs: Mutex<HashMap<StageKind, Duration>>,
    calls: Mutex<Vec<StageKind>>,
}

impl ScriptedValidationTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, stage: StageKind, outcomes: Vec<Result<ToolOutcome>>) -> Self {
        self.scripts.lock().unwrap().insert(stage, outcomes.into());
        self
    }

    pub fn hang(self, stage: StageKind, duration: Duration) -> Self {
        self.hangs.lock().unwrap().insert(stage, duration);
        self
    }

    pub fn calls(&self) -> Vec<StageKind> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, stage: StageKind) -> Result<ToolOutcome> {
        self.calls.lock().unwrap().push(stage);
        let hang = self.hangs.lock().unwrap().get(&stage).copied();
        if let Some(duration) = hang {
            tokio::time::sleep(duration).await;
        }
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(ToolOutcome::pass()))
    }
}

#[async_trait]
impl ValidationTools for ScriptedValidationTools {
    async fn typecheck(&self, _root: &Path, _files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Typecheck).await
    }

    async fn lint(&self, _root: &Path, _files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Lint).await
    }

    async fn test(&self, _root: &Path, _files: &[String]) -> Result<ToolOutcome> {
        self.run(StageKind::Test).await
    }
}
