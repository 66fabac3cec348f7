//! Branch names, commit messages and pull request text.

use std::fmt::Write;

use crate::domain::{FailureSignal, FileChange, MergeDecision, ParsedError, ValidationResult};

const MAX_LISTED_ERRORS: usize = 10;

/// Branch for a run, derived from the external id so re-runs reuse it.
pub fn branch_name(prefix: &str, external_id: &str) -> String {
    let slug: String = external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{prefix}{}", slug.trim_matches('-'))
}

pub fn commit_message(signal: &FailureSignal, changes: &[FileChange]) -> String {
    let mut message = format!("fix: auto-remediate {} failure {}\n\n", signal.source, signal.id);
    for change in changes {
        let fixes = change.applied_fixes.len();
        let _ = writeln!(message, "- {} ({fixes} fix{})", change.path, plural(fixes, "es"));
    }
    message
}

pub fn title(signal: &FailureSignal, errors: &[ParsedError]) -> String {
    let n = errors.len();
    format!(
        "fix({}): auto-remediate {n} error{} from {}",
        signal.source,
        plural(n, "s"),
        signal.id
    )
}

/// Labels for the PR; failed validation adds `manual_review_label`.
pub fn labels(base: &[String], manual_review_label: &str, validation: &ValidationResult) -> Vec<String> {
    let mut labels = base.to_vec();
    if !validation.passed && !labels.iter().any(|l| l == manual_review_label) {
        labels.push(manual_review_label.to_string());
    }
    labels
}

/// Markdown body describing what was fixed and how it was checked.
pub fn description(
    signal: &FailureSignal,
    errors: &[ParsedError],
    changes: &[FileChange],
    validation: &ValidationResult,
    decision: &MergeDecision,
    attempts: u32,
) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "Automated fix for a `{}` failure (`{}`).\n",
        signal.source, signal.id
    );

    if !validation.passed {
        let _ = writeln!(
            body,
            "> **Needs review:** validation did not pass after {attempts} attempt{}.\n",
            plural(attempts as usize, "s")
        );
    }

    let _ = writeln!(body, "## Errors\n");
    for error in errors.iter().take(MAX_LISTED_ERRORS) {
        let location = if error.location.has_file() {
            format!("`{}` ", error.location)
        } else {
            String::new()
        };
        let _ = writeln!(
            body,
            "- {location}**{}** {}",
            error.error_type.as_str(),
            error.message
        );
    }
    if errors.len() > MAX_LISTED_ERRORS {
        let _ = writeln!(body, "- ... {} more", errors.len() - MAX_LISTED_ERRORS);
    }

    let _ = writeln!(body, "\n## Changes\n");
    for change in changes {
        let _ = writeln!(body, "- `{}`", change.path);
        for fix in &change.applied_fixes {
            let _ = writeln!(
                body,
                "  - lines {}-{}: {}",
                fix.line_start, fix.line_end, fix.description
            );
        }
    }

    let _ = writeln!(
        body,
        "\n## Validation\n\nScore {:.0}% after {attempts} attempt{}.\n",
        validation.overall_score,
        plural(attempts as usize, "s")
    );
    let _ = writeln!(body, "| Stage | Result |\n| --- | --- |");
    for stage in &validation.stages {
        let result = if stage.skipped {
            "skipped"
        } else if stage.passed {
            "passed"
        } else {
            "failed"
        };
        let _ = writeln!(body, "| {} | {result} |", stage.stage);
    }

    let _ = writeln!(
        body,
        "\n## Merge policy\n\nPolicy `{}`: {} (confidence {:.2}).",
        decision.policy.label(),
        decision.reason,
        decision.confidence
    );
    body
}

fn plural(n: usize, suffix: &str) -> &str {
    if n == 1 {
        ""
    } else {
        suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AppliedFix, ErrorType, Location, MergePolicy, RepositoryRef, Severity, StageKind,
        StageResult, CONSERVATIVE_DEFAULT,
    };

    fn signal() -> FailureSignal {
        FailureSignal::from_log(
            "deploy/42",
            "vercel",
            "Build failed",
            RepositoryRef {
                owner: "acme".into(),
                name: "web".into(),
                base_branch: "main".into(),
                local_path: "/tmp/web".into(),
            },
        )
    }

    fn validation(passed: bool) -> ValidationResult {
        ValidationResult::from_stages(
            vec![StageResult {
                stage: StageKind::Syntax,
                passed,
                skipped: false,
                errors: Vec::new(),
                warnings: Vec::new(),
                duration_ms: 1,
            }],
            1,
        )
    }

    #[test]
    fn test_branch_name_sanitized() {
        assert_eq!(branch_name("auto-fix/", "deploy/42"), "auto-fix/deploy-42");
        assert_eq!(branch_name("auto-fix/", "evt_1.a"), "auto-fix/evt_1.a");
    }

    #[test]
    fn test_labels_flag_manual_review() {
        let base = vec!["auto-fix".to_string()];
        assert_eq!(labels(&base, "needs-review", &validation(true)), base);
        assert_eq!(
            labels(&base, "needs-review", &validation(false)),
            vec!["auto-fix".to_string(), "needs-review".to_string()]
        );
    }

    #[test]
    fn test_description_sections() {
        let error = ParsedError {
            id: "e1".into(),
            error_type: ErrorType::Type,
            severity: Severity::Error,
            message: "Type 'string' is not assignable to type 'number'.".into(),
            location: Location::new(Some("src/a.ts".into()), Some(3), Some(7)),
            code: Some("TS2322".into()),
            confidence: 0.9,
            extractor: "typescript".into(),
        };
        let change = FileChange {
            path: "src/a.ts".into(),
            original: "a".into(),
            modified: "b".into(),
            diff: String::new(),
            applied_fixes: vec![AppliedFix {
                error_id: "e1".into(),
                line_start: 3,
                line_end: 3,
                description: "use a number".into(),
            }],
        };
        let decision = MergeDecision {
            should_merge: false,
            reason: "manual approval required".into(),
            failed_gates: vec!["manual approval required".into()],
            policy: MergePolicy::new("vercel", None, CONSERVATIVE_DEFAULT),
            ci_passed: true,
            validation_passed: false,
            confidence: 0.7,
        };

        let body = description(&signal(), &[error], &[change], &validation(false), &decision, 2);
        assert!(body.contains("Needs review"));
        assert!(body.contains("`src/a.ts:3:7`"));
        assert!(body.contains("lines 3-3: use a number"));
        assert!(body.contains("| syntax | failed |"));
        assert!(body.contains("Policy `vercel`"));
    }

    #[test]
    fn test_commit_message_lists_files() {
        let change = FileChange {
            path: "src/a.ts".into(),
            original: String::new(),
            modified: String::new(),
            diff: String::new(),
            applied_fixes: Vec::new(),
        };
        let message = commit_message(&signal(), &[change]);
        assert!(message.starts_with("fix: auto-remediate vercel failure deploy/42"));
        assert!(message.contains("- src/a.ts (0 fixes)"));
    }
}
