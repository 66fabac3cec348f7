//! Tolerant parsing of JSON embedded in provider output.
//!
//! Providers wrap JSON in prose or markdown fences and omit optional fields.
//! Parsing never throws: callers receive a [`ParseOutcome`] and must handle
//! both variants.

use serde::de::DeserializeOwned;

/// Result of parsing provider output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Ok { value: T },
    Failed { raw: String, reason: String },
}

impl<T> ParseOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseOutcome::Ok { .. })
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ParseOutcome::Ok { value } => Some(value),
            ParseOutcome::Failed { .. } => None,
        }
    }
}

/// Strip a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `rust`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Slice from the first `open` to the last `close`.
pub fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start <= end).then(|| &text[start..=end])
}

/// Parse a JSON object out of raw provider text.
///
/// Tries the fenced body as-is, then the outermost `{...}` fragment.
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> ParseOutcome<T> {
    let body = strip_code_fences(raw);
    let first_err = match serde_json::from_str::<T>(body) {
        Ok(value) => return ParseOutcome::Ok { value },
        Err(e) => e,
    };

    if let Some(fragment) = extract_json_fragment(body, '{', '}') {
        if let Ok(value) = serde_json::from_str::<T>(fragment) {
            return ParseOutcome::Ok { value };
        }
    }

    ParseOutcome::Failed {
        raw: raw.to_string(),
        reason: first_err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        fixes: Vec<u32>,
        #[serde(default)]
        note: Option<String>,
    }

    #[test]
    fn test_strip_fences_with_language() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_parse_object_inside_prose() {
        let raw = "Here is the fix:\n{\"fixes\": [1, 2]}\nLet me know.";
        let outcome: ParseOutcome<Reply> = parse_json_object(raw);
        assert_eq!(
            outcome,
            ParseOutcome::Ok {
                value: Reply {
                    fixes: vec![1, 2],
                    note: None
                }
            }
        );
    }

    #[test]
    fn test_parse_failure_keeps_raw() {
        let outcome: ParseOutcome<Reply> = parse_json_object("I could not fix this.");
        match outcome {
            ParseOutcome::Failed { raw, .. } => assert_eq!(raw, "I could not fix this."),
            ParseOutcome::Ok { .. } => panic!("expected failure"),
        }
    }
}
