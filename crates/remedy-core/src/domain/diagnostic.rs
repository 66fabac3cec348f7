//! Classified error records produced from raw failure signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of failure a diagnostic describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Syntax,
    Type,
    Runtime,
    Lint,
    Test,
    Build,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Syntax => "syntax",
            ErrorType::Type => "type",
            ErrorType::Runtime => "runtime",
            ErrorType::Lint => "lint",
            ErrorType::Test => "test",
            ErrorType::Build => "build",
            ErrorType::Unknown => "unknown",
        }
    }

    /// Default severity for this error type.
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorType::Build | ErrorType::Runtime => Severity::Critical,
            ErrorType::Syntax | ErrorType::Type | ErrorType::Test => Severity::Error,
            ErrorType::Lint => Severity::Warning,
            ErrorType::Unknown => Severity::Info,
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level, ordered most severe first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank: critical < error < warning < info.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
        }
    }

    /// Parse an explicit severity word captured from tool output.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" | "fatal" | "panic" => Some(Severity::Critical),
            "error" | "err" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" | "note" | "hint" | "help" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// Source location of a diagnostic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Location {
    pub fn new(file: Option<String>, line: Option<u32>, column: Option<u32>) -> Self {
        Self { file, line, column }
    }

    pub fn has_file(&self) -> bool {
        self.file.as_deref().is_some_and(|f| !f.is_empty())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => write!(f, "{file}:{line}:{col}"),
            (Some(file), Some(line), None) => write!(f, "{file}:{line}"),
            (Some(file), None, _) => write!(f, "{file}"),
            (None, _, _) => f.write_str("<unknown>"),
        }
    }
}

/// A single classified, deduplicated error record.
///
/// Immutable once created by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedError {
    /// Fingerprint of (type, file, line, code).
    pub id: String,

    #[serde(rename = "type")]
    pub error_type: ErrorType,

    pub severity: Severity,

    pub message: String,

    pub location: Location,

    /// Diagnostic or rule code (e.g. `TS2322`, `no-unused-vars`, `E0308`).
    pub code: Option<String>,

    /// Heuristic correctness estimate in `[0, 1]`.
    pub confidence: f64,

    /// Name of the extractor that produced the record.
    pub extractor: String,
}

impl ParsedError {
    /// Compute the deduplication fingerprint.
    ///
    /// Records without a file fall back to the message so distinct
    /// location-less diagnostics stay distinct.
    pub fn fingerprint(
        error_type: ErrorType,
        location: &Location,
        code: Option<&str>,
        message: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(error_type.as_str().as_bytes());
        hasher.update(b"\0");
        match &location.file {
            Some(file) => hasher.update(file.as_bytes()),
            None => hasher.update(message.trim().as_bytes()),
        }
        hasher.update(b"\0");
        hasher.update(location.line.unwrap_or(0).to_le_bytes());
        hasher.update(b"\0");
        hasher.update(code.unwrap_or("").as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}

/// Output of one classification pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub source: String,
    pub errors: Vec<ParsedError>,
    /// Matches found before deduplication.
    pub total_found: usize,
    pub duplicates_removed: usize,
    pub auto_fixable: usize,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_ordering() {
        assert!(Severity::Critical.rank() < Severity::Error.rank());
        assert!(Severity::Error.rank() < Severity::Warning.rank());
        assert!(Severity::Warning.rank() < Severity::Info.rank());
        assert!(Severity::Critical < Severity::Info);
    }

    #[test]
    fn test_severity_from_label() {
        assert_eq!(Severity::from_label("ERROR"), Some(Severity::Error));
        assert_eq!(Severity::from_label("warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_label("note"), Some(Severity::Info));
        assert_eq!(Severity::from_label("banana"), None);
    }

    #[test]
    fn test_fingerprint_stable_and_location_sensitive() {
        let loc = Location::new(Some("src/a.ts".into()), Some(3), Some(1));
        let a = ParsedError::fingerprint(ErrorType::Type, &loc, Some("TS2322"), "x");
        let b = ParsedError::fingerprint(ErrorType::Type, &loc, Some("TS2322"), "other text");
        assert_eq!(a, b, "message must not matter when a file is present");

        let moved = Location::new(Some("src/a.ts".into()), Some(4), Some(1));
        let c = ParsedError::fingerprint(ErrorType::Type, &moved, Some("TS2322"), "x");
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_without_file_uses_message() {
        let loc = Location::default();
        let a = ParsedError::fingerprint(ErrorType::Runtime, &loc, None, "boom");
        let b = ParsedError::fingerprint(ErrorType::Runtime, &loc, None, "bang");
        assert_ne!(a, b);
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new(Some("lib.rs".into()), Some(7), None);
        assert_eq!(loc.to_string(), "lib.rs:7");
        assert_eq!(Location::default().to_string(), "<unknown>");
    }
}
