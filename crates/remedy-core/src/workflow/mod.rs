//! End-to-end remediation runs.
//!
//! A run moves a [`FailureSignal`] through analyze, generate and apply,
//! validate (with bounded retries), merge decision, then branch, commit,
//! push, pull request and an optional CI-gated merge. Every step emits a
//! [`ProgressEvent`] on a broadcast channel and a structured log record.
//!
//! Only zero-output conditions short-circuit: nothing to fix, nothing
//! generated, nothing written. A failed validation still opens a PR, flagged
//! for manual review.

pub mod ci_wait;
pub mod in_flight;
pub mod pr;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::classifier::ErrorClassifier;
use crate::config::{RemedyConfig, WorkflowConfig};
use crate::domain::{
    FailureSignal, FileChange, MergeDecision, ParsedError, PhaseOutcome, ProgressEvent,
    PullRequestRef, Result, RunOutcome, StepStatus, ValidationResult, WorkflowResult,
    WorkflowStep,
};
use crate::fixer::{FixContext, FixGenerator, RollbackStore};
use crate::merge_policy::MergePolicyEngine;
use crate::metrics::METRICS;
use crate::obs::{self, RunSpan};
use crate::provider::{GenerationProvider, GitProvider, MergeMethod, PullRequestRequest, ValidationTools};
use crate::validation::ValidationPipeline;

pub use ci_wait::{wait_for_ci, CiWaitOutcome};
pub use in_flight::{InFlightRuns, RunGuard};
pub use retry::{should_retry, RetryContext, RETRY_SCORE_THRESHOLD};

const EVENT_CAPACITY: usize = 256;

/// External collaborators of the engine.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub generator: Arc<dyn GenerationProvider>,
    pub git: Arc<dyn GitProvider>,
    pub tools: Arc<dyn ValidationTools>,
    pub rollbacks: Arc<RollbackStore>,
}

/// How a run ended, before it is folded into the [`WorkflowResult`].
#[derive(Debug)]
struct Stop {
    outcome: RunOutcome,
    message: String,
}

impl Stop {
    fn new(outcome: RunOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }
}

/// Changes that survived generate/apply/validate.
struct Remediation {
    errors: Vec<ParsedError>,
    changes: Vec<FileChange>,
    rollback_id: String,
    validation: ValidationResult,
    confidence: f64,
    attempts: u32,
}

struct RunCtx<'a> {
    run_id: &'a str,
    signal: &'a FailureSignal,
    cancel: &'a CancellationToken,
}

pub struct WorkflowEngine {
    classifier: Arc<ErrorClassifier>,
    fixer: FixGenerator,
    validator: ValidationPipeline,
    policies: MergePolicyEngine,
    git: Arc<dyn GitProvider>,
    config: WorkflowConfig,
    in_flight: Arc<InFlightRuns>,
    events: broadcast::Sender<ProgressEvent>,
}

impl WorkflowEngine {
    pub fn new(config: &RemedyConfig, deps: WorkflowDeps) -> Result<Self> {
        config.validate()?;
        let classifier = Arc::new(ErrorClassifier::with_config(config.classifier.clone())?);
        let fixer = FixGenerator::new(
            deps.generator,
            Arc::clone(&classifier),
            deps.rollbacks,
            config.generation.clone(),
        );
        let validator = ValidationPipeline::new(deps.tools, config.validation.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            classifier,
            fixer,
            validator,
            policies: MergePolicyEngine::new(config.policy_table()),
            git: deps.git,
            config: config.workflow.clone(),
            in_flight: Arc::new(InFlightRuns::new(config.workflow.max_concurrent_runs)),
            events,
        })
    }

    /// Receive progress events for every run started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn in_flight(&self) -> &Arc<InFlightRuns> {
        &self.in_flight
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub async fn run(&self, signal: &FailureSignal) -> Result<WorkflowResult> {
        self.run_with_cancel(signal, CancellationToken::new()).await
    }

    /// Run the full pipeline for `signal`.
    ///
    /// Fails only when the run cannot start: another run for the same
    /// external id is in flight, or the engine is at capacity. Everything
    /// after that is reported through the returned [`WorkflowResult`].
    pub async fn run_with_cancel(
        &self,
        signal: &FailureSignal,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult> {
        let _guard = self.in_flight.try_acquire(&signal.id)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = RunSpan::span(&run_id, &signal.id);
        Ok(self.execute(run_id, signal, cancel).instrument(span).await)
    }

    async fn execute(
        &self,
        run_id: String,
        signal: &FailureSignal,
        cancel: CancellationToken,
    ) -> WorkflowResult {
        let started = Instant::now();
        METRICS.inc_runs_started();
        obs::emit_run_started(&run_id, &signal.source, &signal.id);

        let run = RunCtx {
            run_id: &run_id,
            signal,
            cancel: &cancel,
        };
        let mut result = WorkflowResult::new(&run_id, &signal.id);
        let stop = self.drive(&run, &mut result).await.unwrap_or_else(|stop| stop);

        let status = match stop.outcome {
            RunOutcome::Failed | RunOutcome::Aborted | RunOutcome::Cancelled => StepStatus::Failed,
            _ => StepStatus::Completed,
        };
        self.emit(&run, WorkflowStep::Done, status, &stop.message, json!({ "outcome": stop.outcome }));
        let result = result.finish(stop.outcome, stop.message);

        obs::emit_run_finished(
            &run_id,
            result.outcome,
            result.attempts,
            started.elapsed().as_millis() as u64,
        );
        METRICS.flush();
        result
    }

    async fn drive(&self, run: &RunCtx<'_>, result: &mut WorkflowResult) -> std::result::Result<Stop, Stop> {
        let errors = self.analyze(run, result)?;
        let remediation = self.remediate(run, errors, result).await?;
        result.attempts = remediation.attempts;
        result.changes = remediation.changes.clone();
        result.validation = Some(remediation.validation.clone());

        // CI has not run yet; decide as if it will pass.
        let decision = self.decide(run, &remediation, true);
        result.decision = Some(decision.clone());

        if run.cancel.is_cancelled() {
            self.rollback_quietly(run, &remediation.rollback_id).await;
            return Err(Stop::new(RunOutcome::Cancelled, "run cancelled before publishing"));
        }

        if self.config.dry_run {
            self.rollback_quietly(run, &remediation.rollback_id).await;
            self.emit(run, WorkflowStep::PullRequest, StepStatus::Skipped, "dry run", Value::Null);
            return Ok(Stop::new(
                RunOutcome::DryRun,
                format!(
                    "dry run: {} file(s) changed, validation {} (score {:.0}), merge: {}",
                    remediation.changes.len(),
                    if remediation.validation.passed { "passed" } else { "failed" },
                    remediation.validation.overall_score,
                    decision.reason
                ),
            ));
        }

        let pr = self.open_pull_request(run, &remediation, &decision, result).await?;
        result.pull_request = Some(pr.clone());
        self.await_merge(run, &remediation, &decision, &pr, result).await
    }

    fn analyze(&self, run: &RunCtx<'_>, result: &mut WorkflowResult) -> std::result::Result<Vec<ParsedError>, Stop> {
        self.emit(run, WorkflowStep::Analyze, StepStatus::Started, "classifying failure signal", Value::Null);
        let analysis = self
            .classifier
            .parse_payload(&run.signal.raw_payload, &run.signal.source);
        result.errors_found = analysis.errors.len();

        let mut fixable: Vec<ParsedError> = analysis
            .errors
            .into_iter()
            .filter(|e| self.classifier.is_auto_fixable(e))
            .collect();
        if fixable.len() > self.config.max_errors {
            fixable = self.classifier.prioritize(fixable, self.config.max_errors);
        }

        let data = json!({
            "found": result.errors_found,
            "fixable": fixable.len(),
            "duplicates_removed": analysis.duplicates_removed,
        });
        if fixable.is_empty() {
            let message = if result.errors_found == 0 {
                "no errors found in signal".to_string()
            } else {
                format!("no errors eligible for an automatic fix ({} found)", result.errors_found)
            };
            self.emit(run, WorkflowStep::Analyze, StepStatus::Failed, &message, data);
            return Err(Stop::new(RunOutcome::Aborted, message));
        }
        self.emit(
            run,
            WorkflowStep::Analyze,
            StepStatus::Completed,
            &format!("{} error(s) to fix", fixable.len()),
            data,
        );
        Ok(fixable)
    }

    /// Generate, apply and validate, retrying with the failure analysis
    /// appended to the suggestion while [`should_retry`] allows.
    async fn remediate(
        &self,
        run: &RunCtx<'_>,
        errors: Vec<ParsedError>,
        result: &mut WorkflowResult,
    ) -> std::result::Result<Remediation, Stop> {
        let root = &run.signal.repository.local_path;
        let mut retry = RetryContext::new(run.signal.suggestion.clone(), self.config.retry_context_cap);

        let (mut changes, mut confidence) = self.generate(run, &errors, &retry).await?;
        let (mut rollback_id, applied) = self.apply(run, &changes).await?;
        changes = applied;

        let mut attempt = 0;
        loop {
            attempt += 1;
            result.attempts = attempt;
            self.emit(
                run,
                WorkflowStep::Validate,
                StepStatus::Started,
                &format!("validation attempt {attempt}"),
                Value::Null,
            );
            let validation = self
                .validator
                .validate_fix(&changes, root, self.config.validation_level)
                .await;
            self.emit(
                run,
                WorkflowStep::Validate,
                if validation.passed { StepStatus::Completed } else { StepStatus::Failed },
                &format!("validation score {:.0}", validation.overall_score),
                json!({
                    "attempt": attempt,
                    "score": validation.overall_score,
                    "failed_stages": validation.failed_stages(),
                }),
            );

            if !should_retry(&validation, attempt, self.config.max_retries) {
                return Ok(Remediation {
                    errors,
                    changes,
                    rollback_id,
                    validation,
                    confidence,
                    attempts: attempt,
                });
            }
            if run.cancel.is_cancelled() {
                self.rollback_quietly(run, &rollback_id).await;
                return Err(Stop::new(RunOutcome::Cancelled, "run cancelled during validation"));
            }

            retry.record(attempt, &validation);
            self.emit(
                run,
                WorkflowStep::Retry,
                StepStatus::Started,
                &format!("retrying after attempt {attempt}"),
                json!({ "attempt": attempt }),
            );
            self.rollback_quietly(run, &rollback_id).await;

            match self.generate(run, &errors, &retry).await {
                Ok((next, next_confidence)) => {
                    let (id, applied) = self.apply(run, &next).await?;
                    changes = applied;
                    rollback_id = id;
                    confidence = next_confidence;
                }
                Err(_) => {
                    debug!(run_id = run.run_id, "regeneration produced nothing, restoring previous changes");
                    let (id, applied) = self.apply(run, &changes).await?;
                    return Ok(Remediation {
                        errors,
                        changes: applied,
                        rollback_id: id,
                        validation,
                        confidence,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn generate(
        &self,
        run: &RunCtx<'_>,
        errors: &[ParsedError],
        retry: &RetryContext,
    ) -> std::result::Result<(Vec<FileChange>, f64), Stop> {
        self.emit(
            run,
            WorkflowStep::Generate,
            StepStatus::Started,
            &format!("generating fixes for {} error(s)", errors.len()),
            json!({ "provider": self.fixer.provider_name() }),
        );
        let context = FixContext::new(run.signal.repository.local_path.clone())
            .with_suggestion(retry.suggestion());
        let batch = self.fixer.generate_batch_fix(errors, &context).await;

        if batch.changes.is_empty() || batch.successful() == 0 {
            let reasons: Vec<&str> = batch
                .results
                .iter()
                .flat_map(|r| r.errors.iter().map(String::as_str))
                .collect();
            let message = match reasons.first() {
                Some(first) => format!("fix generation failed: {first}"),
                None => "fix generation failed".to_string(),
            };
            self.emit(run, WorkflowStep::Generate, StepStatus::Failed, &message, json!({ "errors": reasons }));
            return Err(Stop::new(RunOutcome::Aborted, message));
        }

        self.emit(
            run,
            WorkflowStep::Generate,
            StepStatus::Completed,
            &format!("{} file(s) changed", batch.changes.len()),
            json!({
                "files": batch.changes.len(),
                "fixes": batch.successful(),
                "skipped": batch.skipped.len(),
                "confidence": batch.confidence,
            }),
        );
        Ok((batch.changes, batch.confidence))
    }

    /// Write `changes`, returning the rollback id and the changes that landed.
    async fn apply(
        &self,
        run: &RunCtx<'_>,
        changes: &[FileChange],
    ) -> std::result::Result<(String, Vec<FileChange>), Stop> {
        let root = &run.signal.repository.local_path;
        let report = self.fixer.apply_changes(root, changes).await;
        for (path, reason) in &report.failed {
            warn!(run_id = run.run_id, path = %path, reason = %reason, "change not applied");
        }
        let data = json!({ "applied": report.applied, "failed": report.failed.len() });

        if report.applied.is_empty() {
            self.rollback_quietly(run, &report.rollback_id).await;
            let message = "no files could be written";
            self.emit(run, WorkflowStep::Apply, StepStatus::Failed, message, data);
            return Err(Stop::new(RunOutcome::Aborted, message));
        }

        self.emit(
            run,
            WorkflowStep::Apply,
            StepStatus::Completed,
            &format!("{} file(s) written", report.applied.len()),
            data,
        );
        let applied = changes
            .iter()
            .filter(|c| report.applied.contains(&c.path))
            .cloned()
            .collect();
        Ok((report.rollback_id, applied))
    }

    fn decide(&self, run: &RunCtx<'_>, remediation: &Remediation, ci_passed: bool) -> MergeDecision {
        let decision = self.policies.decide_merge(
            &run.signal.source,
            run.signal.subtype.as_deref(),
            ci_passed,
            &remediation.validation,
            remediation.confidence,
        );
        obs::emit_merge_decided(run.run_id, &decision);
        self.emit(
            run,
            WorkflowStep::Decide,
            StepStatus::Completed,
            &decision.reason,
            json!({
                "should_merge": decision.should_merge,
                "policy": decision.policy.label(),
                "ci_passed": ci_passed,
            }),
        );
        decision
    }

    async fn open_pull_request(
        &self,
        run: &RunCtx<'_>,
        remediation: &Remediation,
        decision: &MergeDecision,
        result: &mut WorkflowResult,
    ) -> std::result::Result<PullRequestRef, Stop> {
        let repo = &run.signal.repository;
        let branch = pr::branch_name(&self.config.branch_prefix, &run.signal.id);
        let base = self
            .config
            .base_branch
            .clone()
            .unwrap_or_else(|| repo.base_branch.clone());
        let files: Vec<String> = remediation.changes.iter().map(|c| c.path.clone()).collect();

        self.phase(
            run,
            WorkflowStep::Branch,
            &mut result.branch,
            self.git.create_branch(repo, &branch, &base),
            |_| branch.clone(),
        )
        .await?;

        let message = pr::commit_message(run.signal, &remediation.changes);
        self.phase(
            run,
            WorkflowStep::Commit,
            &mut result.commit,
            self.git.commit(repo, &branch, &message, &files),
            |sha: &String| sha.clone(),
        )
        .await?;

        self.phase(
            run,
            WorkflowStep::Push,
            &mut result.push,
            self.git.push(repo, &branch),
            |_| branch.clone(),
        )
        .await?;

        let request = PullRequestRequest {
            title: pr::title(run.signal, &remediation.errors),
            body: pr::description(
                run.signal,
                &remediation.errors,
                &remediation.changes,
                &remediation.validation,
                decision,
                remediation.attempts,
            ),
            head: branch.clone(),
            base,
            labels: pr::labels(
                &self.config.pr_labels,
                &self.config.manual_review_label,
                &remediation.validation,
            ),
        };
        self.phase(
            run,
            WorkflowStep::PullRequest,
            &mut result.pr,
            self.git.create_pr(repo, &request),
            |pr: &PullRequestRef| pr.url.clone(),
        )
        .await
    }

    /// Wait for CI when the policy requires it, then merge if every gate
    /// still passes. A PR that cannot merge is left open.
    async fn await_merge(
        &self,
        run: &RunCtx<'_>,
        remediation: &Remediation,
        decision: &MergeDecision,
        pr: &PullRequestRef,
        result: &mut WorkflowResult,
    ) -> std::result::Result<Stop, Stop> {
        let repo = &run.signal.repository;
        if !decision.should_merge {
            self.emit(run, WorkflowStep::Merge, StepStatus::Skipped, &decision.reason, Value::Null);
            return Ok(Stop::new(
                RunOutcome::PullRequestOpened,
                format!("pull request #{} opened for review: {}", pr.number, decision.reason),
            ));
        }

        if decision.policy.gates.requires_ci_pass {
            self.emit(
                run,
                WorkflowStep::CiWait,
                StepStatus::Started,
                &format!("waiting for CI on {}", pr.head_sha),
                Value::Null,
            );
            let outcome = wait_for_ci(
                self.git.as_ref(),
                repo,
                &pr.head_sha,
                self.config.ci_poll_interval(),
                self.config.ci_timeout(),
                run.cancel,
            )
            .await;
            let message = match outcome {
                CiWaitOutcome::Passed => None,
                CiWaitOutcome::Failed(checks) => Some(format!(
                    "CI failed ({}); pull request #{} left open",
                    checks.join(", "),
                    pr.number
                )),
                CiWaitOutcome::TimedOut => Some(format!(
                    "CI did not finish within {}s; pull request #{} left open",
                    self.config.ci_timeout_secs, pr.number
                )),
                CiWaitOutcome::Cancelled => {
                    let message = format!(
                        "run cancelled while waiting for CI; pull request #{} left open",
                        pr.number
                    );
                    self.emit(run, WorkflowStep::CiWait, StepStatus::Failed, &message, Value::Null);
                    return Err(Stop::new(RunOutcome::Cancelled, message));
                }
            };
            if let Some(message) = message {
                self.emit(run, WorkflowStep::CiWait, StepStatus::Failed, &message, Value::Null);
                result.decision = Some(self.decide(run, remediation, false));
                return Ok(Stop::new(RunOutcome::PullRequestOpened, message));
            }
            self.emit(run, WorkflowStep::CiWait, StepStatus::Completed, "CI passed", Value::Null);
        }

        let final_decision = self.decide(run, remediation, true);
        result.decision = Some(final_decision.clone());
        if !final_decision.should_merge {
            return Ok(Stop::new(
                RunOutcome::PullRequestOpened,
                format!("pull request #{} opened for review: {}", pr.number, final_decision.reason),
            ));
        }

        self.phase(
            run,
            WorkflowStep::Merge,
            &mut result.merge,
            self.git.merge_pr(repo, pr.number, MergeMethod::Squash, true),
            |_| format!("#{}", pr.number),
        )
        .await?;
        METRICS.inc_merges();
        Ok(Stop::new(
            RunOutcome::Merged,
            format!("pull request #{} merged", pr.number),
        ))
    }

    /// Run one external phase, recording its outcome in `slot`.
    async fn phase<T>(
        &self,
        run: &RunCtx<'_>,
        step: WorkflowStep,
        slot: &mut Option<PhaseOutcome>,
        operation: impl Future<Output = Result<T>>,
        detail: impl FnOnce(&T) -> String,
    ) -> std::result::Result<T, Stop> {
        self.emit(run, step, StepStatus::Started, step.as_str(), Value::Null);
        match operation.await {
            Ok(value) => {
                let detail = detail(&value);
                self.emit(run, step, StepStatus::Completed, &detail, Value::Null);
                *slot = Some(PhaseOutcome::ok(detail));
                Ok(value)
            }
            Err(e) => {
                let message = format!("{step} failed: {e}");
                self.emit(run, step, StepStatus::Failed, &message, Value::Null);
                *slot = Some(PhaseOutcome::err(e.to_string()));
                Err(Stop::new(RunOutcome::Failed, message))
            }
        }
    }

    async fn rollback_quietly(&self, run: &RunCtx<'_>, rollback_id: &str) {
        if let Err(e) = self.fixer.rollback(rollback_id).await {
            obs::emit_rollback_error(run.run_id, &e);
        }
    }

    fn emit(&self, run: &RunCtx<'_>, step: WorkflowStep, status: StepStatus, message: &str, data: Value) {
        obs::emit_phase(run.run_id, step, status, message);
        // No receivers is fine.
        let _ = self.events.send(ProgressEvent {
            run_id: run.run_id.to_string(),
            step,
            status,
            message: message.to_string(),
            data,
        });
    }
}
