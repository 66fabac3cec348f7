//! Merge policy rules and merge decisions.

use serde::{Deserialize, Serialize};

/// Gate settings carried by every merge policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MergeGates {
    pub auto_merge: bool,
    pub requires_ci_pass: bool,
    pub requires_manual_approval: bool,
    pub minimum_confidence: f64,
}

/// Gates applied when no rule matches a (source, subtype) pair.
pub const CONSERVATIVE_DEFAULT: MergeGates = MergeGates {
    auto_merge: false,
    requires_ci_pass: true,
    requires_manual_approval: true,
    minimum_confidence: 0.9,
};

/// A static rule keyed by source and optional subtype.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergePolicy {
    pub source: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(flatten)]
    pub gates: MergeGates,
}

impl MergePolicy {
    pub fn new(source: impl Into<String>, subtype: Option<&str>, gates: MergeGates) -> Self {
        Self {
            source: source.into(),
            subtype: subtype.map(str::to_string),
            gates,
        }
    }

    /// Policy resolved when nothing matched.
    pub fn conservative(source: &str, subtype: Option<&str>) -> Self {
        Self::new(source, subtype, CONSERVATIVE_DEFAULT)
    }

    pub fn label(&self) -> String {
        match &self.subtype {
            Some(subtype) => format!("{}/{}", self.source, subtype),
            None => self.source.clone(),
        }
    }
}

/// Outcome of combining CI, validation and confidence under a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeDecision {
    pub should_merge: bool,
    /// "All checks passed" or the failed gates joined with `; `.
    pub reason: String,
    /// One entry per failed gate.
    pub failed_gates: Vec<String>,
    pub policy: MergePolicy,
    pub ci_passed: bool,
    pub validation_passed: bool,
    pub confidence: f64,
}
