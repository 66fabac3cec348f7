//! Structured lifecycle records for remediation runs.
//!
//! - [`RunSpan`] tags every record emitted during a run with its run id
//! - `emit_*` functions log the key lifecycle points at `info!`

use tracing::info;

use crate::domain::{MergeDecision, RunOutcome, StepStatus, WorkflowStep};

/// RAII guard holding a run-scoped span.
///
/// ```ignore
/// let _span = RunSpan::enter("run-1", "deploy-42");
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, external_id: &str) -> Self {
        let span = tracing::info_span!("remedy.run", run_id = %run_id, external_id = %external_id);
        Self {
            _span: span.entered(),
        }
    }

    /// Build the span without entering it, for instrumenting futures.
    pub fn span(run_id: &str, external_id: &str) -> tracing::Span {
        tracing::info_span!("remedy.run", run_id = %run_id, external_id = %external_id)
    }
}

pub fn emit_run_started(run_id: &str, source: &str, external_id: &str) {
    info!(event = "run.started", run_id = %run_id, source = %source, external_id = %external_id);
}

pub fn emit_phase(run_id: &str, step: WorkflowStep, status: StepStatus, message: &str) {
    info!(
        event = "run.phase",
        run_id = %run_id,
        step = ?step,
        status = ?status,
        message = %message,
    );
}

/// Emit the merge decision with its failed gates.
pub fn emit_merge_decided(run_id: &str, decision: &MergeDecision) {
    info!(
        event = "merge.decided",
        run_id = %run_id,
        policy = %decision.policy.label(),
        should_merge = decision.should_merge,
        ci_passed = decision.ci_passed,
        validation_passed = decision.validation_passed,
        confidence = decision.confidence,
        reason = %decision.reason,
    );
}

pub fn emit_run_finished(run_id: &str, outcome: RunOutcome, attempts: u32, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        outcome = ?outcome,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

/// Emit a rollback that could not restore every file (warning level).
pub fn emit_rollback_error(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run.rollback_error", run_id = %run_id, error = %error);
}
