//! Retry decisions and the context fed back into regeneration.

use crate::domain::{StageKind, ValidationResult};

/// Score at or above which a failed validation is considered close enough to
/// retry.
pub const RETRY_SCORE_THRESHOLD: f64 = 50.0;

/// Whether a failed validation warrants another generate/apply/validate
/// attempt.
///
/// `attempt` counts validations already run (1 after the first). No retry
/// once `attempt` reaches `max_retries`. Otherwise retry when the score is at
/// least [`RETRY_SCORE_THRESHOLD`], or when typecheck is the only failure and
/// lint and test both passed.
pub fn should_retry(result: &ValidationResult, attempt: u32, max_retries: u32) -> bool {
    if result.passed || attempt >= max_retries {
        return false;
    }
    if result.overall_score >= RETRY_SCORE_THRESHOLD {
        return true;
    }
    typecheck_only_failure(result)
}

fn typecheck_only_failure(result: &ValidationResult) -> bool {
    let stage_passed = |kind| result.stage(kind).map(|s| s.passed).unwrap_or(false);
    result.failed_stages() == [StageKind::Typecheck]
        && stage_passed(StageKind::Lint)
        && stage_passed(StageKind::Test)
}

/// Accumulates failure analysis from earlier attempts and appends it to the
/// signal's own suggestion.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    original: Option<String>,
    history: String,
    cap: Option<usize>,
}

impl RetryContext {
    pub fn new(original: Option<String>, cap: Option<usize>) -> Self {
        Self {
            original,
            history: String::new(),
            cap,
        }
    }

    /// Record why `attempt` failed validation.
    pub fn record(&mut self, attempt: u32, result: &ValidationResult) {
        self.history.push_str(&format!(
            "Attempt {attempt} failed validation (score {:.0}):\n{}",
            result.overall_score,
            result.failure_analysis()
        ));
        if let Some(cap) = self.cap {
            self.history = keep_tail(&self.history, cap);
        }
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    /// Suggestion to pass to the fix generator.
    pub fn suggestion(&self) -> Option<String> {
        match (&self.original, self.history.is_empty()) {
            (original, true) => original.clone(),
            (None, false) => Some(format!("Previous attempts:\n{}", self.history)),
            (Some(original), false) => Some(format!(
                "{original}\n\nPrevious attempts:\n{}",
                self.history
            )),
        }
    }
}

/// Last `max_chars` characters of `text`.
fn keep_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageResult;

    fn stage(kind: StageKind, passed: bool) -> StageResult {
        StageResult {
            stage: kind,
            passed,
            skipped: false,
            errors: if passed {
                Vec::new()
            } else {
                vec![format!("{kind}: broken")]
            },
            warnings: Vec::new(),
            duration_ms: 1,
        }
    }

    fn result(stages: &[(StageKind, bool)]) -> ValidationResult {
        ValidationResult::from_stages(stages.iter().map(|(k, p)| stage(*k, *p)).collect(), 4)
    }

    #[test]
    fn test_no_retry_at_attempt_limit() {
        let r = result(&[
            (StageKind::Syntax, true),
            (StageKind::Typecheck, true),
            (StageKind::Lint, false),
            (StageKind::Test, false),
        ]);
        assert_eq!(r.overall_score, 50.0);
        assert!(should_retry(&r, 1, 3));
        assert!(should_retry(&r, 2, 3));
        assert!(!should_retry(&r, 3, 3));
    }

    #[test]
    fn test_low_score_not_retried() {
        let r = result(&[(StageKind::Syntax, false)]);
        assert!(!should_retry(&r, 1, 3));
    }

    #[test]
    fn test_typecheck_only_failure_retried() {
        // typecheck failure stops the run, so lint and test were never
        // attempted and the special case does not apply.
        let stopped = result(&[(StageKind::Syntax, true), (StageKind::Typecheck, false)]);
        assert_eq!(stopped.overall_score, 50.0);
        assert!(should_retry(&stopped, 1, 3));

        let r = ValidationResult {
            passed: false,
            overall_score: 25.0,
            ..result(&[
                (StageKind::Syntax, true),
                (StageKind::Typecheck, false),
                (StageKind::Lint, true),
                (StageKind::Test, true),
            ])
        };
        assert!(should_retry(&r, 1, 3));
    }

    #[test]
    fn test_passed_result_never_retried() {
        let r = result(&[(StageKind::Syntax, true)]);
        assert!(!should_retry(&r, 1, 3));
    }

    #[test]
    fn test_context_appends_analysis_to_suggestion() {
        let mut ctx = RetryContext::new(Some("bump the dependency".to_string()), None);
        assert_eq!(ctx.suggestion().as_deref(), Some("bump the dependency"));

        ctx.record(1, &result(&[(StageKind::Syntax, true), (StageKind::Typecheck, false)]));
        let suggestion = ctx.suggestion().unwrap();
        assert!(suggestion.starts_with("bump the dependency\n\nPrevious attempts:"));
        assert!(suggestion.contains("Attempt 1 failed validation"));
        assert!(suggestion.contains("typecheck: broken"));
    }

    #[test]
    fn test_context_cap_keeps_most_recent() {
        let mut ctx = RetryContext::new(None, Some(60));
        ctx.record(1, &result(&[(StageKind::Syntax, false)]));
        ctx.record(2, &result(&[(StageKind::Lint, false)]));
        let suggestion = ctx.suggestion().unwrap();
        assert!(suggestion.contains("lint: broken"));
        assert!(!suggestion.contains("Attempt 1"));
        assert!(ctx.has_history());
    }
}
