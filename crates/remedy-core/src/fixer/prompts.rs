//! Prompt templates, selected by error type.

use crate::domain::{ErrorType, ParsedError};

/// Instructions for the reply format. Parsed by [`super::ProviderReply`].
const REPLY_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "fixes": [
    {
      "file": "<path relative to the repository root>",
      "line_start": <first line to replace, 1-indexed>,
      "line_end": <last line to replace, inclusive; use line_start - 1 to insert>,
      "replacement": "<new text for those lines>",
      "description": "<one sentence>",
      "confidence": <0.0 to 1.0>
    }
  ],
  "confidence": <overall confidence, 0.0 to 1.0>,
  "explanation": "<short explanation>"
}
Line numbers refer to the file exactly as shown. Keep edits minimal."#;

pub const SYSTEM_PROMPT: &str = "You repair source code so that failing builds, checks and \
tests pass. You change as little as possible and never alter behaviour that is unrelated to \
the reported error.";

fn guidance(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::Syntax => {
            "Fix the syntax error. Look for unbalanced delimiters, missing separators and \
             malformed literals near the reported line."
        }
        ErrorType::Type => {
            "Fix the type error. Prefer correcting the value or call site over loosening \
             types; do not add casts to `any` or equivalent escape hatches."
        }
        ErrorType::Lint => {
            "Fix the lint violation in the way the rule intends. Do not disable the rule."
        }
        ErrorType::Runtime => {
            "Fix the runtime failure at its cause. Guard against the invalid state rather \
             than swallowing the exception."
        }
        ErrorType::Test => {
            "Make the failing test pass by fixing the code under test. Only change the test \
             when it is clearly wrong."
        }
        ErrorType::Build => {
            "Fix the build failure. Check imports, module paths and configuration referenced \
             by the error."
        }
        ErrorType::Unknown => "Diagnose the failure from the message and fix its cause.",
    }
}

/// Render `content` with 1-based line numbers, limited to `context` lines
/// around `focus` when a focus line is known.
pub fn numbered_excerpt(content: &str, focus: Option<u32>, context: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let (from, to) = match focus {
        Some(line) if context > 0 => {
            let idx = (line as usize).saturating_sub(1);
            (idx.saturating_sub(context), (idx + context + 1).min(lines.len()))
        }
        _ => (0, lines.len()),
    };
    let width = to.to_string().len();
    lines[from.min(to)..to]
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{:>width$} | {l}\n", from + i + 1))
        .collect()
}

/// Build the fix prompt for one error.
pub fn fix_prompt(
    error: &ParsedError,
    path: &str,
    content: &str,
    context_lines: usize,
    suggestion: Option<&str>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(guidance(error.error_type));
    prompt.push_str("\n\n## Error\n");
    prompt.push_str(&format!("type: {}\n", error.error_type));
    prompt.push_str(&format!("location: {}\n", error.location));
    if let Some(code) = &error.code {
        prompt.push_str(&format!("code: {code}\n"));
    }
    prompt.push_str(&format!("message: {}\n", error.message));

    if let Some(hint) = suggestion.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\n## Notes\n");
        prompt.push_str(hint.trim());
        prompt.push('\n');
    }

    prompt.push_str(&format!("\n## File: {path}\n```\n"));
    prompt.push_str(&numbered_excerpt(content, error.location.line, context_lines));
    prompt.push_str("```\n\n");
    prompt.push_str(REPLY_FORMAT);
    prompt
}
