use std::sync::Arc;

use remedy_core::fakes::ScriptedProvider;
use remedy_core::{
    ErrorClassifier, FileChange, FixContext, FixGenerator, GenerationConfig, RemedyError,
    RollbackStore,
};

fn generator(rollbacks: Arc<RollbackStore>) -> FixGenerator {
    FixGenerator::new(
        Arc::new(ScriptedProvider::new(Vec::new())),
        Arc::new(ErrorClassifier::new().unwrap()),
        rollbacks,
        GenerationConfig::default(),
    )
}

fn change(path: &str, original: &str, modified: &str) -> FileChange {
    FileChange {
        path: path.to_string(),
        original: original.to_string(),
        modified: modified.to_string(),
        diff: String::new(),
        applied_fixes: Vec::new(),
    }
}

#[tokio::test]
async fn rollback_restores_original_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("src")).unwrap();
    // CRLF, no trailing newline and non-UTF-8 bytes must survive untouched.
    let crlf = b"line one\r\nline two".to_vec();
    let binary = vec![0xff, 0xfe, 0x00, 0x41];
    std::fs::write(root.join("src/a.ts"), &crlf).unwrap();
    std::fs::write(root.join("src/blob.bin"), &binary).unwrap();

    let rollbacks = Arc::new(RollbackStore::new());
    let fixer = generator(rollbacks.clone());
    let report = fixer
        .apply_changes(
            root,
            &[
                change("src/a.ts", "line one\r\nline two", "fixed\r\n"),
                change("src/blob.bin", "", "text now"),
                change("src/new.ts", "", "export {};\n"),
            ],
        )
        .await;
    assert_eq!(report.applied.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(std::fs::read_to_string(root.join("src/a.ts")).unwrap(), "fixed\r\n");

    fixer.rollback(&report.rollback_id).await.unwrap();
    assert_eq!(std::fs::read(root.join("src/a.ts")).unwrap(), crlf);
    assert_eq!(std::fs::read(root.join("src/blob.bin")).unwrap(), binary);
    assert!(!root.join("src/new.ts").exists());
    assert!(rollbacks.is_empty());
}

#[tokio::test]
async fn rollback_is_single_use() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "before\n").unwrap();
    let fixer = generator(Arc::new(RollbackStore::new()));

    let report = fixer
        .apply_changes(dir.path(), &[change("a.txt", "before\n", "after\n")])
        .await;
    fixer.rollback(&report.rollback_id).await.unwrap();

    let err = fixer.rollback(&report.rollback_id).await.unwrap_err();
    assert!(matches!(err, RemedyError::RollbackNotFound(_)));
    assert!(matches!(
        fixer.rollback("never-issued").await,
        Err(RemedyError::RollbackNotFound(_))
    ));
}

#[tokio::test]
async fn unwritable_path_reported_per_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blocker"), "a file, not a directory").unwrap();
    let fixer = generator(Arc::new(RollbackStore::new()));

    let report = fixer
        .apply_changes(
            dir.path(),
            &[
                change("blocker/inner.ts", "", "x"),
                change("ok.ts", "", "y"),
            ],
        )
        .await;
    assert_eq!(report.applied, vec!["ok.ts".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "blocker/inner.ts");
}

#[tokio::test]
async fn reply_without_file_targets_error_location() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/app.ts"),
        "const a: number = 1;\nconst b: number = \"2\";\n",
    )
    .unwrap();

    let classifier = Arc::new(ErrorClassifier::new().unwrap());
    let analysis = classifier.parse_errors(
        "src/app.ts(2,7): error TS2322: Type 'string' is not assignable to type 'number'.",
        "ci",
    );
    let error = analysis.errors.first().expect("classified").clone();

    let reply = r#"{"fixes": [{"line_start": 2, "line_end": 2, "replacement": "const b: number = 2;"}], "confidence": 0.8}"#;
    let fixer = FixGenerator::new(
        Arc::new(ScriptedProvider::new(vec![Ok(reply.to_string())])),
        classifier,
        Arc::new(RollbackStore::new()),
        GenerationConfig::default(),
    );

    let result = fixer.generate_fix(&error, &FixContext::new(dir.path())).await;
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].path, "src/app.ts");
    assert_eq!(
        result.changes[0].modified,
        "const a: number = 1;\nconst b: number = 2;\n"
    );
}
