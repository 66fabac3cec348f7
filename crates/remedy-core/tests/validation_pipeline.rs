use std::sync::Arc;

use remedy_core::fakes::ScriptedValidationTools;
use remedy_core::{
    FileChange, RemedyError, StageKind, ToolOutcome, ValidationConfig, ValidationLevel,
    ValidationPipeline,
};

fn change(path: &str, modified: &str) -> FileChange {
    FileChange {
        path: path.to_string(),
        original: String::new(),
        modified: modified.to_string(),
        diff: String::new(),
        applied_fixes: Vec::new(),
    }
}

fn pipeline(tools: ScriptedValidationTools) -> ValidationPipeline {
    ValidationPipeline::new(Arc::new(tools), ValidationConfig::default())
}

#[tokio::test]
async fn full_level_passes_iff_every_stage_passes() {
    let dir = tempfile::tempdir().unwrap();
    let changes = [change("src/lib.rs", "fn main() {}\n")];

    let green = pipeline(ScriptedValidationTools::new())
        .validate_fix(&changes, dir.path(), ValidationLevel::Full)
        .await;
    assert!(green.passed);
    assert_eq!(green.stages.len(), 4);
    assert!(green.stages.iter().all(|s| s.passed));

    let red = pipeline(
        ScriptedValidationTools::new()
            .script(StageKind::Test, vec![Ok(ToolOutcome::fail(vec!["1 test failed".into()]))]),
    )
    .validate_fix(&changes, dir.path(), ValidationLevel::Full)
    .await;
    assert!(!red.passed);
    assert_eq!(red.failed_stages(), vec![StageKind::Test]);
    assert_eq!(red.overall_score, 75.0);
}

#[tokio::test]
async fn missing_tool_skips_stage_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let tools = ScriptedValidationTools::new().script(
        StageKind::Typecheck,
        vec![Err(RemedyError::ValidationTool {
            tool: "tsc".into(),
            reason: "No such file or directory".into(),
        })],
    );
    let result = pipeline(tools)
        .validate_fix(&[change("a.ts", "let a = 1;\n")], dir.path(), ValidationLevel::Full)
        .await;

    let typecheck = result.stage(StageKind::Typecheck).unwrap();
    assert!(typecheck.passed);
    assert!(typecheck.skipped);
    assert!(!typecheck.warnings.is_empty());
    assert!(result.passed);
    assert_eq!(result.overall_score, 100.0);
}

#[tokio::test]
async fn syntax_failure_stops_before_tools() {
    let dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(ScriptedValidationTools::new());
    let pipeline = ValidationPipeline::new(tools.clone(), ValidationConfig::default());
    let result = pipeline
        .validate_fix(&[change("config.json", "{\"a\": }")], dir.path(), ValidationLevel::Full)
        .await;

    assert!(!result.passed);
    assert_eq!(result.stages.len(), 1);
    assert!(tools.calls().is_empty());
}
