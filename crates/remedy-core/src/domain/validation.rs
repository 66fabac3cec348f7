//! Validation stages and their results.

use serde::{Deserialize, Serialize};

/// Validation stage, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Syntax,
    Typecheck,
    Lint,
    Test,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Syntax,
        StageKind::Typecheck,
        StageKind::Lint,
        StageKind::Test,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Syntax => "syntax",
            StageKind::Typecheck => "typecheck",
            StageKind::Lint => "lint",
            StageKind::Test => "test",
        }
    }

    /// Lint failures are reported but do not stop the pipeline.
    pub fn is_advisory(&self) -> bool {
        matches!(self, StageKind::Lint)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How far the pipeline runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Syntax,
    Typecheck,
    Lint,
    #[default]
    Full,
}

impl ValidationLevel {
    /// Stages included at this level.
    pub fn stages(&self) -> &'static [StageKind] {
        match self {
            ValidationLevel::Syntax => &StageKind::ALL[..1],
            ValidationLevel::Typecheck => &StageKind::ALL[..2],
            ValidationLevel::Lint => &StageKind::ALL[..3],
            ValidationLevel::Full => &StageKind::ALL,
        }
    }
}

impl std::str::FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "syntax" => Ok(ValidationLevel::Syntax),
            "typecheck" => Ok(ValidationLevel::Typecheck),
            "lint" => Ok(ValidationLevel::Lint),
            "full" => Ok(ValidationLevel::Full),
            other => Err(format!("unknown validation level: {other}")),
        }
    }
}

/// Result of one validation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageResult {
    pub stage: StageKind,
    pub passed: bool,
    /// The tool could not be invoked; `passed` is true and a warning explains why.
    pub skipped: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn skipped(stage: StageKind, warning: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            stage,
            passed: true,
            skipped: true,
            errors: Vec::new(),
            warnings: vec![warning.into()],
            duration_ms,
        }
    }
}

/// Result of one `validate_fix` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    /// True iff every attempted stage passed.
    pub passed: bool,
    /// Attempted stages, in order. Stages after a fail-fast stop are absent.
    pub stages: Vec<StageResult>,
    /// Percentage of attempted stages that passed, `0..=100`.
    pub overall_score: f64,
    pub duration_ms: u64,
}

impl ValidationResult {
    /// Aggregate attempted stage results.
    pub fn from_stages(stages: Vec<StageResult>, duration_ms: u64) -> Self {
        let attempted = stages.len();
        let passed_count = stages.iter().filter(|s| s.passed).count();
        let overall_score = if attempted == 0 {
            100.0
        } else {
            passed_count as f64 / attempted as f64 * 100.0
        };
        Self {
            passed: passed_count == attempted,
            stages,
            overall_score,
            duration_ms,
        }
    }

    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == kind)
    }

    pub fn failed_stages(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|s| !s.passed)
            .map(|s| s.stage)
            .collect()
    }

    /// Human-readable description of failed stages, for retry prompts.
    pub fn failure_analysis(&self) -> String {
        let mut out = String::new();
        for stage in self.stages.iter().filter(|s| !s.passed) {
            out.push_str(&format!("- {} failed", stage.stage));
            if stage.errors.is_empty() {
                out.push('\n');
                continue;
            }
            out.push_str(":\n");
            for err in stage.errors.iter().take(10) {
                out.push_str(&format!("    {err}\n"));
            }
            if stage.errors.len() > 10 {
                out.push_str(&format!("    ... {} more\n", stage.errors.len() - 10));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(kind: StageKind, passed: bool) -> StageResult {
        StageResult {
            stage: kind,
            passed,
            skipped: false,
            errors: if passed {
                Vec::new()
            } else {
                vec![format!("{kind} broke")]
            },
            warnings: Vec::new(),
            duration_ms: 5,
        }
    }

    #[test]
    fn test_level_stages() {
        assert_eq!(ValidationLevel::Syntax.stages(), &[StageKind::Syntax]);
        assert_eq!(ValidationLevel::Full.stages().len(), 4);
        assert_eq!(
            ValidationLevel::Lint.stages().last(),
            Some(&StageKind::Lint)
        );
    }

    #[test]
    fn test_score_over_attempted_stages() {
        let result = ValidationResult::from_stages(
            vec![stage(StageKind::Syntax, true), stage(StageKind::Typecheck, false)],
            10,
        );
        assert!(!result.passed);
        assert_eq!(result.overall_score, 50.0);
        assert_eq!(result.failed_stages(), vec![StageKind::Typecheck]);
    }

    #[test]
    fn test_skipped_stage_counts_as_passed() {
        let result = ValidationResult::from_stages(
            vec![
                stage(StageKind::Syntax, true),
                StageResult::skipped(StageKind::Typecheck, "tsc not found", 0),
            ],
            1,
        );
        assert!(result.passed);
        assert_eq!(result.overall_score, 100.0);
    }

    #[test]
    fn test_failure_analysis_lists_failed_stages_only() {
        let result = ValidationResult::from_stages(
            vec![stage(StageKind::Syntax, true), stage(StageKind::Typecheck, false)],
            10,
        );
        let analysis = result.failure_analysis();
        assert!(analysis.contains("typecheck failed"));
        assert!(analysis.contains("typecheck broke"));
        assert!(!analysis.contains("syntax"));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("FULL".parse::<ValidationLevel>(), Ok(ValidationLevel::Full));
        assert!("everything".parse::<ValidationLevel>().is_err());
    }
}
