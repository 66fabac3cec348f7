use remedy_core::{
    MergeGates, MergePolicy, MergePolicyEngine, PolicyTable, StageKind, StageResult,
    ValidationResult,
};

fn stage(kind: StageKind, passed: bool) -> StageResult {
    StageResult {
        stage: kind,
        passed,
        skipped: false,
        errors: Vec::new(),
        warnings: Vec::new(),
        duration_ms: 1,
    }
}

fn full_pass() -> ValidationResult {
    ValidationResult::from_stages(StageKind::ALL.iter().map(|k| stage(*k, true)).collect(), 4)
}

fn failed_lint() -> ValidationResult {
    ValidationResult::from_stages(
        StageKind::ALL
            .iter()
            .map(|k| stage(*k, *k != StageKind::Lint))
            .collect(),
        4,
    )
}

#[test]
fn github_with_everything_green_merges() {
    let engine = MergePolicyEngine::default();
    let validation = full_pass();
    assert_eq!(validation.overall_score, 100.0);

    let decision = engine.decide_merge("github", None, true, &validation, 0.9);
    assert!(decision.should_merge);
    assert_eq!(decision.reason, "All checks passed");
    assert!(decision.failed_gates.is_empty());
}

#[test]
fn supabase_security_needs_manual_approval() {
    let engine = MergePolicyEngine::default();
    let decision = engine.decide_merge("supabase", Some("security"), true, &full_pass(), 0.95);
    assert!(!decision.should_merge);
    assert!(decision.policy.gates.requires_manual_approval);
}

#[test]
fn failed_ci_never_merges() {
    let engine = MergePolicyEngine::default();
    let sources = [
        ("github", None),
        ("github", Some("dependency")),
        ("vercel", Some("build")),
        ("sentry", None),
        ("supabase", None),
        ("unknown-source", Some("whatever")),
    ];
    for (source, subtype) in sources {
        for confidence in [0.0, 0.5, 0.99, 1.0] {
            for validation in [full_pass(), failed_lint()] {
                let decision = engine.decide_merge(source, subtype, false, &validation, confidence);
                assert!(
                    !decision.should_merge,
                    "{source}/{subtype:?} merged with failed CI"
                );
                assert!(decision
                    .failed_gates
                    .iter()
                    .any(|g| g.contains("CI checks did not pass")));
            }
        }
    }
}

#[test]
fn unknown_source_falls_back_to_conservative_default() {
    let engine = MergePolicyEngine::default();
    let decision = engine.decide_merge("pagerduty", None, true, &full_pass(), 1.0);
    assert!(!decision.should_merge);
    assert!(!decision.policy.gates.auto_merge);
    assert!(decision.policy.gates.requires_manual_approval);
}

#[test]
fn reason_lists_each_failed_gate() {
    let engine = MergePolicyEngine::default();
    let decision = engine.decide_merge("vercel", None, true, &failed_lint(), 0.5);
    assert!(!decision.should_merge);
    assert_eq!(decision.failed_gates.len(), 2, "{:?}", decision.failed_gates);
    assert_eq!(decision.reason, decision.failed_gates.join("; "));
}

#[test]
fn custom_policy_overrides_standard_entry() {
    let table = PolicyTable::standard().with_policy(MergePolicy::new(
        "sentry",
        None,
        MergeGates {
            auto_merge: true,
            requires_ci_pass: true,
            requires_manual_approval: false,
            minimum_confidence: 0.5,
        },
    ));
    let engine = MergePolicyEngine::new(table);
    let decision = engine.decide_merge("Sentry", None, true, &full_pass(), 0.6);
    assert!(decision.should_merge, "{}", decision.reason);
}
