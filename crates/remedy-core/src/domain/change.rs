//! Proposed fixes and the file changes they produce.

use serde::{Deserialize, Serialize};

/// One structured edit proposed by a generation provider.
///
/// Line numbers are 1-indexed and inclusive; `line_end < line_start`
/// denotes a pure insertion before `line_start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedFix {
    /// Empty when the reply targets the file the error points at.
    #[serde(default)]
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub replacement: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A fix that was successfully spliced into a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedFix {
    pub error_id: String,
    pub line_start: u32,
    pub line_end: u32,
    pub description: String,
}

/// Proposed modification of one file within a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    pub original: String,
    pub modified: String,
    /// Unified diff from `original` to `modified`.
    pub diff: String,
    pub applied_fixes: Vec<AppliedFix>,
}

impl FileChange {
    pub fn is_noop(&self) -> bool {
        self.original == self.modified
    }
}

/// Outcome of generating a fix for one error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixResult {
    pub error_id: String,
    pub success: bool,
    pub changes: Vec<FileChange>,
    /// Provider-reported confidence, clamped to `[0, 1]`.
    pub confidence: f64,
    pub explanation: Option<String>,
    /// Per-fix failures (out-of-range splices, unreadable files, ...).
    pub errors: Vec<String>,
}

impl FixResult {
    pub fn failed(error_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error_id: error_id.into(),
            success: false,
            changes: Vec::new(),
            confidence: 0.0,
            explanation: None,
            errors: vec![reason.into()],
        }
    }
}

/// Merged outcome of fixing a batch of errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchFixResult {
    /// One change per touched file, with later edits layered over earlier ones.
    pub changes: Vec<FileChange>,
    pub results: Vec<FixResult>,
    /// Mean confidence across successful fixes (0 when none succeeded).
    pub confidence: f64,
    /// Error ids filtered out before generation.
    pub skipped: Vec<String>,
}

impl BatchFixResult {
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Outcome of writing a set of changes to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyReport {
    /// Handle for [`crate::fixer::FixGenerator::rollback`].
    pub rollback_id: String,
    pub applied: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposed_fix_defaults() {
        let fix: ProposedFix = serde_json::from_value(serde_json::json!({
            "file": "src/a.ts",
            "line_start": 3,
            "line_end": 3,
            "replacement": "const x: number = 1;"
        }))
        .expect("deserialize");
        assert!(fix.description.is_empty());
        assert_eq!(fix.confidence, None);
    }

    #[test]
    fn test_fix_result_failed() {
        let r = FixResult::failed("abc", "file not found");
        assert!(!r.success);
        assert_eq!(r.errors, vec!["file not found".to_string()]);
    }
}
