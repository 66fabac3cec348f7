//! ErrorClassifier: raw failure text to typed, deduplicated, scored errors.
//!
//! Classification never fails on unrecognised input. When no extractor
//! matches, a single low-confidence `unknown` record is produced so the
//! caller still has something to report.

pub mod extractors;
pub mod payload;

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{AnalysisResult, ErrorType, Location, ParsedError, Result, Severity};
pub use extractors::{default_extractors, Extractor, RawMatch};
pub use payload::flatten_payload;

/// Classifier tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum confidence for automatic fixing.
    pub auto_fix_threshold: f64,
    /// Messages longer than this are truncated.
    pub max_message_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            auto_fix_threshold: 0.6,
            max_message_len: 500,
        }
    }
}

/// Error types eligible for automatic fixing.
const FIXABLE_TYPES: [ErrorType; 3] = [ErrorType::Type, ErrorType::Syntax, ErrorType::Lint];

pub struct ErrorClassifier {
    extractors: Vec<Box<dyn Extractor>>,
    config: ClassifierConfig,
}

impl ErrorClassifier {
    pub fn new() -> Result<Self> {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Result<Self> {
        Ok(Self {
            extractors: default_extractors()?,
            config,
        })
    }

    /// Append an extractor; it runs after the built-in ones.
    pub fn push_extractor(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a raw payload: plain strings are parsed directly, structured
    /// payloads are flattened first.
    pub fn parse_payload(&self, payload: &Value, source: &str) -> AnalysisResult {
        match payload {
            Value::String(text) => self.parse_errors(text, source),
            other => self.parse_errors(&flatten_payload(other), source),
        }
    }

    /// Extract, score, deduplicate and sort the errors in `log`.
    pub fn parse_errors(&self, log: &str, source: &str) -> AnalysisResult {
        let lines: Vec<&str> = log.lines().collect();
        let mut claimed = vec![false; lines.len()];
        let mut matches: Vec<(RawMatch, &'static str)> = Vec::new();

        for extractor in &self.extractors {
            for m in extractor.extract(&lines) {
                let (start, end) = m.span;
                let end = end.min(lines.len().saturating_sub(1));
                if start > end || claimed[start..=end].iter().any(|c| *c) {
                    continue;
                }
                claimed[start..=end].iter_mut().for_each(|c| *c = true);
                matches.push((m, extractor.name()));
            }
        }
        // Restore log order; extractor order only decided line ownership.
        matches.sort_by_key(|(m, _)| m.span.0);

        let mut errors: Vec<ParsedError> = matches
            .into_iter()
            .map(|(m, name)| self.build(m, name))
            .collect();

        if errors.is_empty() {
            if let Some(fallback) = self.fallback(&lines) {
                errors.push(fallback);
            }
        }

        let total_found = errors.len();
        let mut seen = HashSet::new();
        errors.retain(|e| seen.insert(e.id.clone()));
        let duplicates_removed = total_found - errors.len();
        errors.sort_by_key(|e| e.severity.rank());

        let auto_fixable = errors.iter().filter(|e| self.is_auto_fixable(e)).count();
        debug!(
            source,
            total_found, duplicates_removed, auto_fixable, "classified failure signal"
        );

        AnalysisResult {
            source: source.to_string(),
            errors,
            total_found,
            duplicates_removed,
            auto_fixable,
            analyzed_at: Utc::now(),
        }
    }

    /// File present, confidence at or above the threshold, and a fixable type.
    pub fn is_auto_fixable(&self, error: &ParsedError) -> bool {
        error.location.has_file()
            && error.confidence >= self.config.auto_fix_threshold
            && FIXABLE_TYPES.contains(&error.error_type)
    }

    /// Remediation priority: severity base, fixability bonus, confidence term.
    pub fn calculate_priority(&self, error: &ParsedError) -> f64 {
        let base = match error.severity {
            Severity::Critical => 100.0,
            Severity::Error => 75.0,
            Severity::Warning => 50.0,
            Severity::Info => 25.0,
        };
        let bonus = if self.is_auto_fixable(error) { 20.0 } else { 0.0 };
        base + bonus + error.confidence * 10.0
    }

    /// Keep the `max_errors` highest-priority errors, highest first.
    pub fn prioritize(&self, mut errors: Vec<ParsedError>, max_errors: usize) -> Vec<ParsedError> {
        errors.sort_by(|a, b| {
            self.calculate_priority(b)
                .total_cmp(&self.calculate_priority(a))
        });
        errors.truncate(max_errors);
        errors
    }

    fn build(&self, m: RawMatch, extractor: &str) -> ParsedError {
        let message = truncate(m.message.trim(), self.config.max_message_len);
        let location = Location::new(m.file, m.line, m.column);
        let severity = m
            .severity
            .unwrap_or_else(|| m.error_type.default_severity());
        let confidence = score(m.error_type, &location, m.code.is_some(), &message);
        ParsedError {
            id: ParsedError::fingerprint(m.error_type, &location, m.code.as_deref(), &message),
            error_type: m.error_type,
            severity,
            message,
            location,
            code: m.code,
            confidence,
            extractor: extractor.to_string(),
        }
    }

    fn fallback(&self, lines: &[&str]) -> Option<ParsedError> {
        let non_empty = || lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
        let line = non_empty()
            .find(|l| l.to_ascii_lowercase().contains("error"))
            .or_else(|| non_empty().next())?;
        let m = RawMatch {
            span: (0, 0),
            error_type: ErrorType::Unknown,
            severity: None,
            message: line.to_string(),
            file: None,
            line: None,
            column: None,
            code: None,
        };
        Some(self.build(m, "fallback"))
    }
}

/// Weighted sum of signal presence, clamped to `[0, 1]`.
fn score(error_type: ErrorType, location: &Location, has_code: bool, message: &str) -> f64 {
    let mut confidence: f64 = 0.0;
    if location.has_file() {
        confidence += 0.3;
    }
    if location.line.is_some() {
        confidence += 0.1;
    }
    if location.column.is_some() {
        confidence += 0.05;
    }
    confidence += match error_type {
        ErrorType::Type | ErrorType::Syntax => 0.35,
        ErrorType::Lint => 0.3,
        ErrorType::Build | ErrorType::Test => 0.2,
        ErrorType::Runtime => 0.15,
        ErrorType::Unknown => 0.05,
    };
    if has_code {
        confidence += 0.1;
    }
    if (10..=500).contains(&message.chars().count()) {
        confidence += 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new().expect("built-in patterns compile")
    }

    #[test]
    fn test_unrecognised_input_degrades_to_unknown() {
        let result = classifier().parse_errors("something odd happened\nERROR: exit 1", "vercel");
        assert_eq!(result.errors.len(), 1);
        let e = &result.errors[0];
        assert_eq!(e.error_type, ErrorType::Unknown);
        assert_eq!(e.message, "ERROR: exit 1");
        assert!(e.confidence < 0.6);
        assert_eq!(e.extractor, "fallback");
    }

    #[test]
    fn test_empty_input_yields_no_errors() {
        let result = classifier().parse_errors("  \n\n", "github");
        assert!(result.is_empty());
        assert_eq!(result.total_found, 0);
    }

    #[test]
    fn test_duplicates_removed_keep_first() {
        let log = "src/a.ts(3,7): error TS2322: first wording\n\
                   src/a.ts(3,9): error TS2322: second wording";
        let result = classifier().parse_errors(log, "github");
        assert_eq!(result.total_found, 2);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.errors[0].message, "first wording");
    }

    #[test]
    fn test_confidence_full_signal() {
        let log = "src/a.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.";
        let result = classifier().parse_errors(log, "github");
        assert_eq!(result.errors[0].confidence, 1.0);
        assert_eq!(result.auto_fixable, 1);
    }

    #[test]
    fn test_not_fixable_without_file() {
        let c = classifier();
        let mut e = c
            .parse_errors(
                "src/a.ts(3,7): error TS2322: Type 'string' is not assignable.",
                "github",
            )
            .errors
            .remove(0);
        e.location.file = None;
        e.confidence = 1.0;
        assert!(!c.is_auto_fixable(&e));
    }

    #[test]
    fn test_priority_orders_budget() {
        let log = "src/a.ts(3,7): error TS2322: Type 'string' is not assignable to 'number'.\n\
                   Error: Build failed with 1 error";
        let c = classifier();
        let result = c.parse_errors(log, "vercel");
        assert_eq!(result.errors.len(), 2);
        let top = c.prioritize(result.errors, 1);
        assert_eq!(top.len(), 1);
        // Fixability bonus outweighs the severity gap to a location-less build failure.
        assert_eq!(top[0].error_type, ErrorType::Type);
    }

    #[test]
    fn test_truncate_long_message() {
        let long = "x".repeat(600);
        let out = truncate(&long, 500);
        assert_eq!(out.chars().count(), 503);
    }
}
