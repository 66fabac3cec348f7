//! FixGenerator: classified errors to proposed file edits, plus on-disk
//! apply and rollback.
//!
//! Provider replies are parsed tolerantly. Malformed output yields zero
//! fixes for that error, and an out-of-range splice fails only the fix
//! that requested it.

pub mod prompts;
pub mod rollback;
pub mod splice;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::ErrorClassifier;
use crate::domain::{
    AppliedFix, ApplyReport, BatchFixResult, FileChange, FixResult, ParsedError, ProposedFix,
    RemedyError, Result,
};
use crate::metrics::METRICS;
use crate::provider::{
    generate_with_backoff, parse_json_object, BackoffConfig, GenerationOptions,
    GenerationProvider, ParseOutcome,
};
pub use rollback::{RollbackEntry, RollbackStore};
pub use splice::{splice_lines, unified_diff};

/// Confidence assumed when a provider reports none.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Lines of context around the error line shown to the provider
    /// (0 sends the whole file).
    pub context_lines: usize,
    pub backoff: BackoffConfig,
    /// REST endpoint for the default provider.
    pub endpoint: Option<String>,
    /// Environment variable holding the REST API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: 0.2,
            context_lines: 40,
            backoff: BackoffConfig::default(),
            endpoint: None,
            api_key_env: "REMEDY_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Per-call context for fix generation.
#[derive(Debug, Clone, Default)]
pub struct FixContext {
    /// Repository checkout the error paths are relative to.
    pub root: PathBuf,
    /// Upstream hint plus any accumulated retry analysis.
    pub suggestion: Option<String>,
}

impl FixContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProviderReply {
    #[serde(default)]
    fixes: Vec<ProposedFix>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Working copies of files touched during one generation pass.
#[derive(Debug, Default)]
struct Overlay {
    order: Vec<String>,
    files: HashMap<String, (String, String)>,
}

impl Overlay {
    async fn load(&mut self, root: &Path, rel: &str) -> Result<String> {
        if let Some((_, current)) = self.files.get(rel) {
            return Ok(current.clone());
        }
        let content = tokio::fs::read_to_string(root.join(rel))
            .await
            .map_err(|e| RemedyError::application(rel, e.to_string()))?;
        self.order.push(rel.to_string());
        self.files
            .insert(rel.to_string(), (content.clone(), content.clone()));
        Ok(content)
    }

    fn update(&mut self, rel: &str, content: String) {
        if let Some((_, current)) = self.files.get_mut(rel) {
            *current = content;
        }
    }

    /// `(path, disk original, current)` for every modified file, in load order.
    fn modified(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.order.iter().filter_map(move |path| {
            let (original, current) = self.files.get(path)?;
            (original != current).then_some((path.as_str(), original.as_str(), current.as_str()))
        })
    }
}

/// Map an error path onto a path relative to `root`.
///
/// Absolute paths from another checkout (CI runners) are matched by the
/// longest suffix that exists under `root`.
fn resolve_in_root(root: &Path, file: &str) -> Option<String> {
    let path = Path::new(file);
    let rel: PathBuf = if path.is_absolute() {
        match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let parts: Vec<Component<'_>> = path
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                (0..parts.len())
                    .map(|i| parts[i..].iter().collect::<PathBuf>())
                    .find(|suffix| root.join(suffix).is_file())?
            }
        }
    } else {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    if rel.as_os_str().is_empty() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
        return None;
    }
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub struct FixGenerator {
    provider: Arc<dyn GenerationProvider>,
    classifier: Arc<ErrorClassifier>,
    rollbacks: Arc<RollbackStore>,
    config: GenerationConfig,
}

impl FixGenerator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        classifier: Arc<ErrorClassifier>,
        rollbacks: Arc<RollbackStore>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            classifier,
            rollbacks,
            config,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.config.model.clone(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            system: Some(prompts::SYSTEM_PROMPT.to_string()),
        }
    }

    /// Generate a fix for one error against the files on disk.
    pub async fn generate_fix(&self, error: &ParsedError, context: &FixContext) -> FixResult {
        let mut overlay = Overlay::default();
        self.generate_into(error, context, &mut overlay).await
    }

    /// Generate fixes for every auto-fixable error, layering edits to the
    /// same file in order so later edits win on overlap.
    pub async fn generate_batch_fix(
        &self,
        errors: &[ParsedError],
        context: &FixContext,
    ) -> BatchFixResult {
        let mut overlay = Overlay::default();
        let mut results = Vec::new();
        let mut skipped = Vec::new();

        for error in errors {
            if !self.classifier.is_auto_fixable(error) {
                debug!(error_id = %error.id, "error not auto-fixable, skipping");
                skipped.push(error.id.clone());
                continue;
            }
            results.push(self.generate_into(error, context, &mut overlay).await);
        }

        let changes: Vec<FileChange> = overlay
            .modified()
            .map(|(path, original, current)| FileChange {
                path: path.to_string(),
                original: original.to_string(),
                modified: current.to_string(),
                diff: unified_diff(path, original, current),
                applied_fixes: results
                    .iter()
                    .flat_map(|r| r.changes.iter())
                    .filter(|c| c.path == path)
                    .flat_map(|c| c.applied_fixes.iter().cloned())
                    .collect(),
            })
            .collect();

        let confidence = mean(results.iter().filter(|r| r.success).map(|r| r.confidence))
            .unwrap_or(0.0);

        BatchFixResult {
            changes,
            results,
            confidence,
            skipped,
        }
    }

    async fn generate_into(
        &self,
        error: &ParsedError,
        context: &FixContext,
        overlay: &mut Overlay,
    ) -> FixResult {
        let Some(file) = error.location.file.as_deref() else {
            return FixResult::failed(&error.id, "error has no file location");
        };
        let Some(rel) = resolve_in_root(&context.root, file) else {
            return FixResult::failed(&error.id, format!("{file} is outside the repository"));
        };
        let content = match overlay.load(&context.root, &rel).await {
            Ok(content) => content,
            Err(e) => return FixResult::failed(&error.id, e.to_string()),
        };

        let prompt = prompts::fix_prompt(
            error,
            &rel,
            &content,
            self.config.context_lines,
            context.suggestion.as_deref(),
        );
        let generation = match generate_with_backoff(
            self.provider.as_ref(),
            &prompt,
            &self.options(),
            &self.config.backoff,
        )
        .await
        {
            Ok(generation) => generation,
            Err(e) => {
                warn!(error_id = %error.id, provider = self.provider.name(), error = %e, "generation failed");
                return FixResult::failed(&error.id, e.to_string());
            }
        };

        let reply = match parse_json_object::<ProviderReply>(&generation.text) {
            ParseOutcome::Ok { value } => value,
            ParseOutcome::Failed { raw, reason } => {
                warn!(error_id = %error.id, bytes = raw.len(), %reason, "provider output not parseable");
                return FixResult::failed(&error.id, format!("unparseable provider output: {reason}"));
            }
        };

        self.apply_reply(error, &context.root, &rel, reply, overlay)
            .await
    }

    async fn apply_reply(
        &self,
        error: &ParsedError,
        root: &Path,
        default_path: &str,
        reply: ProviderReply,
        overlay: &mut Overlay,
    ) -> FixResult {
        let mut errors = Vec::new();
        let reported = reply.confidence;
        let per_fix = mean(reply.fixes.iter().filter_map(|f| f.confidence));

        let mut groups: Vec<(String, Vec<ProposedFix>)> = Vec::new();
        for fix in reply.fixes {
            let target = if fix.file.trim().is_empty() {
                default_path.to_string()
            } else {
                match resolve_in_root(root, &fix.file) {
                    Some(rel) => rel,
                    None => {
                        errors.push(
                            RemedyError::application(&fix.file, "outside the repository").to_string(),
                        );
                        continue;
                    }
                }
            };
            match groups.iter_mut().find(|(path, _)| *path == target) {
                Some((_, fixes)) => fixes.push(fix),
                None => groups.push((target, vec![fix])),
            }
        }

        let mut changes = Vec::new();
        for (path, mut fixes) in groups {
            let before = match overlay.load(root, &path).await {
                Ok(content) => content,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };

            // Line numbers refer to `before`; apply bottom-up.
            fixes.sort_by(|a, b| b.line_start.cmp(&a.line_start));
            let mut current = before.clone();
            let mut applied = Vec::new();
            for fix in fixes {
                match splice_lines(&current, fix.line_start, fix.line_end, &fix.replacement) {
                    Ok(next) => {
                        current = next;
                        applied.push(AppliedFix {
                            error_id: error.id.clone(),
                            line_start: fix.line_start,
                            line_end: fix.line_end,
                            description: fix.description,
                        });
                    }
                    Err(reason) => errors.push(RemedyError::application(&path, reason).to_string()),
                }
            }
            if current == before {
                continue;
            }
            applied.reverse();
            overlay.update(&path, current.clone());
            let diff = unified_diff(&path, &before, &current);
            changes.push(FileChange {
                path,
                original: before,
                modified: current,
                diff,
                applied_fixes: applied,
            });
        }

        if changes.is_empty() && errors.is_empty() {
            errors.push("provider proposed no applicable changes".to_string());
        }
        let confidence = clamp_confidence(reported.or(per_fix).unwrap_or(DEFAULT_CONFIDENCE));

        FixResult {
            error_id: error.id.clone(),
            success: !changes.is_empty(),
            changes,
            confidence,
            explanation: reply.explanation,
            errors,
        }
    }

    /// Write changes under `root`, recording the previous bytes under a new
    /// rollback id. Failures are collected per file.
    pub async fn apply_changes(&self, root: &Path, changes: &[FileChange]) -> ApplyReport {
        let rollback_id = uuid::Uuid::new_v4().to_string();
        let mut entries = Vec::new();
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for change in changes {
            let path = root.join(&change.path);
            let original = match tokio::fs::read(&path).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    failed.push((change.path.clone(), e.to_string()));
                    continue;
                }
            };
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    failed.push((change.path.clone(), e.to_string()));
                    continue;
                }
            }
            match tokio::fs::write(&path, change.modified.as_bytes()).await {
                Ok(()) => {
                    entries.push(RollbackEntry { path, original });
                    applied.push(change.path.clone());
                }
                Err(e) => failed.push((change.path.clone(), e.to_string())),
            }
        }

        self.rollbacks.insert(rollback_id.clone(), entries);
        METRICS.add_fixes_applied(applied.len() as u64);
        info!(%rollback_id, applied = applied.len(), failed = failed.len(), "changes applied");

        ApplyReport {
            rollback_id,
            applied,
            failed,
        }
    }

    /// Restore every file recorded under `rollback_id`. An id can be rolled
    /// back once; files that did not exist before are removed.
    pub async fn rollback(&self, rollback_id: &str) -> Result<Vec<PathBuf>> {
        let entries = self
            .rollbacks
            .take(rollback_id)
            .ok_or_else(|| RemedyError::RollbackNotFound(rollback_id.to_string()))?;

        let mut restored = Vec::new();
        let mut first_error = None;
        for entry in entries {
            let outcome = match &entry.original {
                Some(bytes) => tokio::fs::write(&entry.path, bytes).await,
                None => match tokio::fs::remove_file(&entry.path).await {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            match outcome {
                Ok(()) => restored.push(entry.path),
                Err(e) => {
                    warn!(%rollback_id, path = %entry.path.display(), error = %e, "rollback write failed");
                    first_error.get_or_insert_with(|| {
                        RemedyError::application(entry.path.display().to_string(), e.to_string())
                    });
                }
            }
        }

        METRICS.inc_rollbacks();
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(%rollback_id, restored = restored.len(), "changes rolled back");
                Ok(restored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_in_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "x").unwrap();

        assert_eq!(resolve_in_root(dir.path(), "./src/a.ts").as_deref(), Some("src/a.ts"));
        assert_eq!(resolve_in_root(dir.path(), "../etc/passwd"), None);

        let inside = dir.path().join("src/a.ts");
        assert_eq!(
            resolve_in_root(dir.path(), inside.to_str().unwrap()).as_deref(),
            Some("src/a.ts")
        );
        assert_eq!(
            resolve_in_root(dir.path(), "/home/runner/work/app/app/src/a.ts").as_deref(),
            Some("src/a.ts")
        );
        assert_eq!(resolve_in_root(dir.path(), "/elsewhere/missing.ts"), None);
    }

    #[test]
    fn test_mean_and_clamp() {
        assert_eq!(mean([0.5, 1.0].into_iter()), Some(0.75));
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }
}
