//! MergePolicyEngine: policy lookup and merge gating.
//!
//! Lookup walks an ordered list of matchers, first match wins:
//! exact `(source, subtype)`, then `(source, no subtype)`, then
//! [`CONSERVATIVE_DEFAULT`](crate::domain::CONSERVATIVE_DEFAULT).

use serde::{Deserialize, Serialize};

use crate::domain::{MergeDecision, MergeGates, MergePolicy, ValidationResult};

type Matcher = fn(&MergePolicy, &str, Option<&str>) -> bool;

fn exact(policy: &MergePolicy, source: &str, subtype: Option<&str>) -> bool {
    match (policy.subtype.as_deref(), subtype) {
        (Some(want), Some(got)) => {
            policy.source.eq_ignore_ascii_case(source) && want.eq_ignore_ascii_case(got)
        }
        _ => false,
    }
}

fn source_only(policy: &MergePolicy, source: &str, _subtype: Option<&str>) -> bool {
    policy.subtype.is_none() && policy.source.eq_ignore_ascii_case(source)
}

const LOOKUP_ORDER: [Matcher; 2] = [exact, source_only];

const ALL_CHECKS_PASSED: &str = "All checks passed";

/// Ordered set of merge policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    pub policies: Vec<MergePolicy>,
}

impl PolicyTable {
    /// Built-in policies.
    ///
    /// | source/subtype       | auto | manual | min conf |
    /// |----------------------|------|--------|----------|
    /// | github               | yes  | no     | 0.80     |
    /// | github/dependency    | yes  | no     | 0.70     |
    /// | vercel               | yes  | no     | 0.80     |
    /// | vercel/build         | yes  | no     | 0.75     |
    /// | sentry               | yes  | no     | 0.85     |
    /// | supabase             | yes  | no     | 0.85     |
    /// | supabase/security    | no   | yes    | 0.95     |
    /// | supabase/migration   | no   | yes    | 0.95     |
    pub fn standard() -> Self {
        let auto = |minimum_confidence| MergeGates {
            auto_merge: true,
            requires_ci_pass: true,
            requires_manual_approval: false,
            minimum_confidence,
        };
        let manual = MergeGates {
            auto_merge: false,
            requires_ci_pass: true,
            requires_manual_approval: true,
            minimum_confidence: 0.95,
        };
        Self {
            policies: vec![
                MergePolicy::new("github", None, auto(0.8)),
                MergePolicy::new("github", Some("dependency"), auto(0.7)),
                MergePolicy::new("vercel", None, auto(0.8)),
                MergePolicy::new("vercel", Some("build"), auto(0.75)),
                MergePolicy::new("sentry", None, auto(0.85)),
                MergePolicy::new("supabase", None, auto(0.85)),
                MergePolicy::new("supabase", Some("security"), manual),
                MergePolicy::new("supabase", Some("migration"), manual),
            ],
        }
    }

    /// Insert `policy`, replacing any rule with the same key.
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        let same_key = |p: &MergePolicy| {
            p.source.eq_ignore_ascii_case(&policy.source)
                && p.subtype.as_deref().map(str::to_ascii_lowercase)
                    == policy.subtype.as_deref().map(str::to_ascii_lowercase)
        };
        match self.policies.iter().position(same_key) {
            Some(idx) => self.policies[idx] = policy,
            None => self.policies.push(policy),
        }
        self
    }

    /// Resolve the policy for a signal.
    pub fn resolve(&self, source: &str, subtype: Option<&str>) -> MergePolicy {
        LOOKUP_ORDER
            .iter()
            .find_map(|matches| self.policies.iter().find(|p| matches(p, source, subtype)))
            .cloned()
            .unwrap_or_else(|| MergePolicy::conservative(source, subtype))
    }
}

/// Combines CI, validation and confidence into a merge decision.
#[derive(Debug, Clone)]
pub struct MergePolicyEngine {
    table: PolicyTable,
}

impl Default for MergePolicyEngine {
    fn default() -> Self {
        Self::new(PolicyTable::standard())
    }
}

impl MergePolicyEngine {
    pub fn new(table: PolicyTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn policy_for(&self, source: &str, subtype: Option<&str>) -> MergePolicy {
        self.table.resolve(source, subtype)
    }

    /// Decide whether a fix may merge without human review.
    ///
    /// Starts from `auto_merge` and ANDs in CI, validation, the confidence
    /// floor and the manual-approval flag, recording one reason per failed
    /// gate. CI is always a gate.
    pub fn decide_merge(
        &self,
        source: &str,
        subtype: Option<&str>,
        ci_passed: bool,
        validation: &ValidationResult,
        confidence: f64,
    ) -> MergeDecision {
        let policy = self.policy_for(source, subtype);
        let gates = policy.gates;
        let mut failed_gates = Vec::new();

        if !gates.auto_merge {
            failed_gates.push(format!("auto-merge disabled by policy {}", policy.label()));
        }
        if !ci_passed {
            failed_gates.push("CI checks did not pass".to_string());
        }
        if !validation.passed {
            failed_gates.push(format!(
                "validation failed ({:.0}% of stages passed)",
                validation.overall_score
            ));
        }
        // Written negated so NaN fails the gate.
        if !(confidence >= gates.minimum_confidence) {
            failed_gates.push(format!(
                "confidence {confidence:.2} below minimum {:.2}",
                gates.minimum_confidence
            ));
        }
        if gates.requires_manual_approval {
            failed_gates.push(format!("manual approval required by policy {}", policy.label()));
        }

        let should_merge = failed_gates.is_empty();
        let reason = if should_merge {
            ALL_CHECKS_PASSED.to_string()
        } else {
            failed_gates.join("; ")
        };

        MergeDecision {
            should_merge,
            reason,
            failed_gates,
            policy,
            ci_passed,
            validation_passed: validation.passed,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StageKind, StageResult, CONSERVATIVE_DEFAULT};

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
    fn test_lookup_order() {
        let table = PolicyTable::standard();
        assert_eq!(table.resolve("vercel", Some("build")).gates.minimum_confidence, 0.75);
        // Unknown subtype falls back to the source-only rule.
        assert_eq!(table.resolve("vercel", Some("edge")).gates.minimum_confidence, 0.8);
        assert_eq!(table.resolve("Vercel", None).subtype, None);
        // Unknown source gets the conservative default.
        let fallback = table.resolve("pagerduty", None);
        assert_eq!(fallback.gates, CONSERVATIVE_DEFAULT);
        assert_eq!(fallback.source, "pagerduty");
    }

    #[test]
    fn test_with_policy_overrides_existing_key() {
        let table = PolicyTable::standard().with_policy(MergePolicy::new(
            "github",
            None,
            MergeGates {
                minimum_confidence: 0.99,
                ..CONSERVATIVE_DEFAULT
            },
        ));
        assert_eq!(table.policies.len(), PolicyTable::standard().policies.len());
        assert_eq!(table.resolve("github", None).gates.minimum_confidence, 0.99);
    }

    #[test]
    fn test_all_gates_pass() {
        let engine = MergePolicyEngine::default();
        let d = engine.decide_merge("github", None, true, &validation(true), 0.9);
        assert!(d.should_merge);
        assert_eq!(d.reason, "All checks passed");
        assert!(d.failed_gates.is_empty());
    }

    #[test]
    fn test_one_reason_per_failed_gate() {
        let engine = MergePolicyEngine::default();
        let d = engine.decide_merge("github", None, false, &validation(false), 0.5);
        assert!(!d.should_merge);
        assert_eq!(d.failed_gates.len(), 3);
        assert!(d.reason.contains("CI checks did not pass"));
        assert!(d.reason.contains("validation failed"));
        assert!(d.reason.contains("below minimum 0.80"));
    }

    #[test]
    fn test_nan_confidence_fails_gate() {
        let engine = MergePolicyEngine::default();
        let d = engine.decide_merge("github", None, true, &validation(true), f64::NAN);
        assert!(!d.should_merge);
    }

    #[test]
    fn test_ci_failure_blocks_every_policy() {
        let engine = MergePolicyEngine::default();
        for policy in engine.table().policies.clone() {
            let d = engine.decide_merge(
                &policy.source,
                policy.subtype.as_deref(),
                false,
                &validation(true),
                1.0,
            );
            assert!(!d.should_merge, "{} merged with failing CI", policy.label());
        }
    }
}
