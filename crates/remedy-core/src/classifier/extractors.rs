//! Pattern extractors for compiler, lint, build, runtime and test output.
//!
//! Each extractor scans the full line list and reports the span of lines it
//! consumed. The classifier lets earlier extractors claim lines first, so a
//! diagnostic that several formats could match is only recorded once.

use regex::{Captures, Regex};

use crate::domain::{ErrorType, Result, Severity};

/// A diagnostic recognised by an extractor, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    /// First and last line (inclusive) consumed by this match.
    pub span: (usize, usize),
    pub error_type: ErrorType,
    /// Severity captured from the output, overriding the type default.
    pub severity: Option<Severity>,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub code: Option<String>,
}

impl RawMatch {
    fn new(span: (usize, usize), error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            span,
            error_type,
            severity: None,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            code: None,
        }
    }

    fn at(mut self, file: Option<&str>, line: Option<u32>, column: Option<u32>) -> Self {
        self.file = file.map(normalize_path);
        self.line = line;
        self.column = column;
        self
    }

    fn with_code(mut self, code: Option<&str>) -> Self {
        self.code = code.map(str::to_string);
        self
    }

    fn with_severity(mut self, label: Option<&str>) -> Self {
        self.severity = label.and_then(severity_label);
        self
    }
}

/// Recognises one family of diagnostic formats.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch>;
}

fn normalize_path(path: &str) -> String {
    let path = path.trim().trim_start_matches("file://");
    path.strip_prefix("./").unwrap_or(path).to_string()
}

fn severity_label(label: &str) -> Option<Severity> {
    if label.to_ascii_lowercase().contains("fatal") {
        return Some(Severity::Critical);
    }
    Severity::from_label(label)
}

fn text<'a>(caps: &Captures<'a>, name: &str) -> Option<&'a str> {
    caps.name(name).map(|m| m.as_str())
}

fn num(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn looks_syntactic(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.starts_with("expected")
        || lower.contains("syntax")
        || lower.contains("unexpected token")
        || lower.contains("unclosed")
        || lower.contains("unterminated")
}

// ---------------------------------------------------------------------------
// TypeScript compiler
// ---------------------------------------------------------------------------

/// `tsc` diagnostics in both `file(l,c): error TSxxxx:` and `file:l:c - error TSxxxx:` forms.
pub struct TypeScriptExtractor {
    paren: Regex,
    dashed: Regex,
}

impl TypeScriptExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            paren: Regex::new(
                r"^(?P<file>[^\s(][^(]*)\((?P<line>\d+),(?P<col>\d+)\):\s*(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.+)$",
            )?,
            dashed: Regex::new(
                r"^(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)\s+-\s+(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.+)$",
            )?,
        })
    }
}

impl Extractor for TypeScriptExtractor {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let line = line.trim_end();
            let Some(caps) = self.paren.captures(line).or_else(|| self.dashed.captures(line)) else {
                continue;
            };
            let code = text(&caps, "code");
            // TS1xxx are parser diagnostics.
            let error_type = match code {
                Some(c) if c.len() == 6 && c.starts_with("TS1") => ErrorType::Syntax,
                _ => ErrorType::Type,
            };
            out.push(
                RawMatch::new((i, i), error_type, text(&caps, "msg").unwrap_or_default().trim())
                    .at(text(&caps, "file"), num(&caps, "line"), num(&caps, "col"))
                    .with_code(code)
                    .with_severity(text(&caps, "sev")),
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// rustc / clippy
// ---------------------------------------------------------------------------

/// rustc multi-line diagnostics: a header line followed by a `-->` location.
pub struct RustcExtractor {
    header: Regex,
    arrow: Regex,
}

impl RustcExtractor {
    const LOOKAHEAD: usize = 4;

    pub fn new() -> Result<Self> {
        Ok(Self {
            header: Regex::new(
                r"^(?P<sev>error|warning)(?:\[(?P<code>E\d{4}|[a-z_:]+)\])?:\s*(?P<msg>.+)$",
            )?,
            arrow: Regex::new(r"^\s*-->\s*(?P<file>[^:\s]+):(?P<line>\d+):(?P<col>\d+)")?,
        })
    }
}

impl Extractor for RustcExtractor {
    fn name(&self) -> &'static str {
        "rustc"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let Some(header) = self.header.captures(line.trim_end()) else {
                continue;
            };
            let end = (i + Self::LOOKAHEAD).min(lines.len().saturating_sub(1));
            let arrow = (i + 1..=end).find_map(|j| self.arrow.captures(lines[j]).map(|c| (j, c)));
            let Some((j, loc)) = arrow else {
                // Summary lines such as "aborting due to" carry no location.
                continue;
            };

            let message = text(&header, "msg").unwrap_or_default().trim();
            let code = text(&header, "code");
            let sev = text(&header, "sev");
            let error_type = if sev == Some("warning") {
                ErrorType::Lint
            } else if code.is_some_and(|c| c.starts_with('E')) {
                ErrorType::Type
            } else if looks_syntactic(message) {
                ErrorType::Syntax
            } else {
                ErrorType::Build
            };

            out.push(
                RawMatch::new((i, j), error_type, message)
                    .at(text(&loc, "file"), num(&loc, "line"), num(&loc, "col"))
                    .with_code(code)
                    .with_severity(sev),
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Generic compiler format (gcc, clang, mypy, go vet ...)
// ---------------------------------------------------------------------------

/// `file:line[:col]: severity: message [code]`.
pub struct CompilerExtractor {
    pattern: Regex,
}

impl CompilerExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(
                r"^(?P<file>[^\s:()]+\.[A-Za-z0-9]+):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>fatal error|error|warning):\s*(?P<msg>.+?)(?:\s+\[(?P<code>[\w-]+)\])?\s*$",
            )?,
        })
    }
}

impl Extractor for CompilerExtractor {
    fn name(&self) -> &'static str {
        "compiler"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = self.pattern.captures(line.trim_end()) else {
                continue;
            };
            let message = text(&caps, "msg").unwrap_or_default();
            let sev = text(&caps, "sev");
            let error_type = if sev == Some("warning") {
                ErrorType::Lint
            } else if looks_syntactic(message) {
                ErrorType::Syntax
            } else {
                ErrorType::Type
            };
            out.push(
                RawMatch::new((i, i), error_type, message)
                    .at(text(&caps, "file"), num(&caps, "line"), num(&caps, "col"))
                    .with_code(text(&caps, "code"))
                    .with_severity(sev),
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Linters
// ---------------------------------------------------------------------------

/// ESLint "stylish" blocks and ruff one-line diagnostics.
pub struct LintExtractor {
    stylish_file: Regex,
    stylish_row: Regex,
    stylish_bare: Regex,
    ruff: Regex,
}

impl LintExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            stylish_file: Regex::new(r"^(?P<file>[^\s:]+\.(?:[cm]?[jt]sx?|vue|svelte))\s*$")?,
            stylish_row: Regex::new(
                r"^\s+(?P<line>\d+):(?P<col>\d+)\s+(?P<sev>error|warning)\s+(?P<msg>.+?)\s{2,}(?P<rule>[@\w/-]+)\s*$",
            )?,
            stylish_bare: Regex::new(
                r"^\s+(?P<line>\d+):(?P<col>\d+)\s+(?P<sev>error|warning)\s+(?P<msg>.+?)\s*$",
            )?,
            ruff: Regex::new(
                r"^(?P<file>[^\s:]+\.pyi?):(?P<line>\d+):(?P<col>\d+):\s+(?P<code>[A-Z]{1,3}\d{2,4})\s+(?:\[\*\]\s+)?(?P<msg>.+)$",
            )?,
        })
    }
}

impl Extractor for LintExtractor {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        let mut current_file: Option<&str> = None;

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() {
                current_file = None;
                continue;
            }

            if let Some(caps) = self.ruff.captures(line) {
                out.push(
                    RawMatch::new((i, i), ErrorType::Lint, text(&caps, "msg").unwrap_or_default())
                        .at(text(&caps, "file"), num(&caps, "line"), num(&caps, "col"))
                        .with_code(text(&caps, "code")),
                );
                continue;
            }

            if let Some(caps) = self.stylish_file.captures(line) {
                current_file = text(&caps, "file");
                continue;
            }

            let Some(file) = current_file else {
                continue;
            };
            if let Some(caps) = self.stylish_row.captures(line) {
                out.push(
                    RawMatch::new((i, i), ErrorType::Lint, text(&caps, "msg").unwrap_or_default())
                        .at(Some(file), num(&caps, "line"), num(&caps, "col"))
                        .with_code(text(&caps, "rule"))
                        .with_severity(text(&caps, "sev")),
                );
            } else if let Some(caps) = self.stylish_bare.captures(line) {
                let message = text(&caps, "msg").unwrap_or_default();
                let error_type = if message.starts_with("Parsing error") {
                    ErrorType::Syntax
                } else {
                    ErrorType::Lint
                };
                out.push(
                    RawMatch::new((i, i), error_type, message)
                        .at(Some(file), num(&caps, "line"), num(&caps, "col"))
                        .with_severity(text(&caps, "sev")),
                );
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Python tracebacks
// ---------------------------------------------------------------------------

/// Python tracebacks and bare `File "...", line N` syntax error reports.
pub struct PythonExtractor {
    frame: Regex,
    exception: Regex,
}

impl PythonExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            frame: Regex::new(r#"^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)"#)?,
            exception: Regex::new(
                r"^(?P<exc>[A-Za-z_][\w.]*(?:Error|Exception|Exit|Interrupt))(?::\s*(?P<msg>.*))?$",
            )?,
        })
    }

    fn is_library_frame(file: &str) -> bool {
        file.contains("site-packages") || file.contains("/lib/python") || file.starts_with('<')
    }
}

impl Extractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        let mut start: Option<usize> = None;
        let mut frames: Vec<(&str, Option<u32>)> = Vec::new();

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim_end();
            if line.starts_with("Traceback (most recent call last)") {
                start = Some(i);
                frames.clear();
                continue;
            }
            if let Some(caps) = self.frame.captures(line) {
                start.get_or_insert(i);
                if let Some(file) = text(&caps, "file") {
                    frames.push((file, num(&caps, "line")));
                }
                continue;
            }
            let Some(begin) = start else {
                continue;
            };
            if line.starts_with(char::is_whitespace) {
                continue;
            }
            let Some(caps) = self.exception.captures(line) else {
                continue;
            };

            let exc = text(&caps, "exc").unwrap_or("Exception");
            let detail = text(&caps, "msg").unwrap_or_default().trim();
            let error_type = if exc.ends_with("SyntaxError")
                || exc.ends_with("IndentationError")
                || exc.ends_with("TabError")
            {
                ErrorType::Syntax
            } else {
                ErrorType::Runtime
            };
            let frame = frames
                .iter()
                .rev()
                .find(|(file, _)| !Self::is_library_frame(file))
                .or_else(|| frames.last());
            let message = if detail.is_empty() {
                exc.to_string()
            } else {
                format!("{exc}: {detail}")
            };

            let (file, line_no) = match frame {
                Some((file, line_no)) => (Some(*file), *line_no),
                None => (None, None),
            };
            out.push(
                RawMatch::new((begin, i), error_type, message)
                    .at(file, line_no, None)
                    .with_code(Some(exc)),
            );
            start = None;
            frames.clear();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Build tools
// ---------------------------------------------------------------------------

/// Bundler, package manager and generic build failures.
pub struct BuildExtractor {
    error_in: Regex,
    module_not_found: Regex,
    cannot_find_module: Regex,
    npm_code: Regex,
    build_failed: Regex,
}

impl BuildExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            error_in: Regex::new(
                r"^ERROR in (?P<file>[^\s(]+?)(?::(?P<line>\d+):(?P<col>\d+))?(?:\s.*)?$",
            )?,
            module_not_found: Regex::new(
                r"Module not found: (?:Error: )?Can't resolve '(?P<module>[^']+)'(?: in '(?P<dir>[^']+)')?",
            )?,
            cannot_find_module: Regex::new(r"Cannot find module '(?P<module>[^']+)'")?,
            npm_code: Regex::new(r"^npm ERR! code (?P<code>\S+)\s*$")?,
            build_failed: Regex::new(
                r"(?i)^(?:error:?\s*)?(?P<msg>build failed.*|command failed with exit code \d+.*|failed to compile.*)$",
            )?,
        })
    }
}

impl Extractor for BuildExtractor {
    fn name(&self) -> &'static str {
        "build"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();

            if let Some(caps) = self.error_in.captures(line) {
                let next = (i + 1..lines.len()).find(|&j| !lines[j].trim().is_empty());
                let (end, message) = match next {
                    Some(j) => (j, lines[j].trim().to_string()),
                    None => (i, line.to_string()),
                };
                out.push(
                    RawMatch::new((i, end), ErrorType::Build, message).at(
                        text(&caps, "file"),
                        num(&caps, "line"),
                        num(&caps, "col"),
                    ),
                );
                i = end + 1;
                continue;
            }

            if let Some(caps) = self.npm_code.captures(line) {
                let mut end = i;
                while end + 1 < lines.len() && lines[end + 1].starts_with("npm ERR!") {
                    end += 1;
                }
                let code = text(&caps, "code");
                out.push(
                    RawMatch::new(
                        (i, end),
                        ErrorType::Build,
                        format!("npm failed with {}", code.unwrap_or("an error")),
                    )
                    .with_code(code),
                );
                i = end + 1;
                continue;
            }

            if let Some(caps) = self.module_not_found.captures(line) {
                let module = text(&caps, "module").unwrap_or_default();
                out.push(
                    RawMatch::new((i, i), ErrorType::Build, format!("Module not found: {module}"))
                        .at(text(&caps, "dir"), None, None)
                        .with_code(Some("MODULE_NOT_FOUND")),
                );
            } else if let Some(caps) = self.cannot_find_module.captures(line) {
                let module = text(&caps, "module").unwrap_or_default();
                out.push(
                    RawMatch::new((i, i), ErrorType::Build, format!("Cannot find module '{module}'"))
                        .with_code(Some("MODULE_NOT_FOUND")),
                );
            } else if let Some(caps) = self.build_failed.captures(line) {
                out.push(RawMatch::new(
                    (i, i),
                    ErrorType::Build,
                    text(&caps, "msg").unwrap_or(line),
                ));
            }
            i += 1;
        }
        out
    }
}

// ---------------------------------------------------------------------------
// JavaScript stack traces
// ---------------------------------------------------------------------------

/// `SomeError: message` followed by V8 `at fn (file:line:col)` frames.
pub struct StackTraceExtractor {
    error_line: Regex,
    frame: Regex,
}

impl StackTraceExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            error_line: Regex::new(r"^(?:Uncaught\s+)?(?P<name>(?:[A-Z]\w*)?Error):\s*(?P<msg>.+)$")?,
            frame: Regex::new(
                r"^\s+at\s+(?:.*?\()?(?P<file>[^\s()]+?):(?P<line>\d+):(?P<col>\d+)\)?\s*$",
            )?,
        })
    }

    fn is_internal(file: &str) -> bool {
        file.contains("node_modules") || file.starts_with("node:") || file.starts_with("internal/")
    }
}

impl Extractor for StackTraceExtractor {
    fn name(&self) -> &'static str {
        "stacktrace"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(head) = self.error_line.captures(lines[i].trim_end()) else {
                i += 1;
                continue;
            };
            let mut frames = Vec::new();
            let mut end = i;
            while end + 1 < lines.len() {
                match self.frame.captures(lines[end + 1]) {
                    Some(frame) => {
                        frames.push(frame);
                        end += 1;
                    }
                    None => break,
                }
            }
            if frames.is_empty() {
                i += 1;
                continue;
            }

            let frame = frames
                .iter()
                .find(|f| text(f, "file").is_some_and(|file| !Self::is_internal(file)))
                .unwrap_or(&frames[0]);
            let name = text(&head, "name").unwrap_or("Error");
            let message = format!("{name}: {}", text(&head, "msg").unwrap_or_default().trim());
            out.push(
                RawMatch::new((i, end), ErrorType::Runtime, message)
                    .at(text(frame, "file"), num(frame, "line"), num(frame, "col"))
                    .with_code(Some(name)),
            );
            i = end + 1;
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Test runners
// ---------------------------------------------------------------------------

/// Jest/Vitest, cargo test and pytest failures.
pub struct TestFailureExtractor {
    suite: Regex,
    bullet: Regex,
    cross: Regex,
    cargo: Regex,
    pytest: Regex,
}

impl TestFailureExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            suite: Regex::new(r"^\s*(?P<state>FAIL|PASS)\s+(?P<file>\S+)")?,
            bullet: Regex::new(r"^\s*●\s+(?P<name>.+?)\s*$")?,
            cross: Regex::new(r"^\s*[×✕✗]\s+(?P<name>.+?)(?:\s+\(\d+(?:\.\d+)?\s*m?s\))?\s*$")?,
            cargo: Regex::new(r"^test (?P<name>\S+) \.\.\. FAILED\s*$")?,
            pytest: Regex::new(r"^FAILED (?P<file>[^:\s]+)::(?P<name>\S+)(?: - (?P<msg>.+))?$")?,
        })
    }

    /// Last segment of a `suite › test` path.
    fn test_name(full: &str) -> &str {
        full.rsplit(" › ").next().unwrap_or(full).trim()
    }
}

impl Extractor for TestFailureExtractor {
    fn name(&self) -> &'static str {
        "tests"
    }

    fn extract(&self, lines: &[&str]) -> Vec<RawMatch> {
        let mut out = Vec::new();
        let mut suite_file: Option<&str> = None;

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim_end();

            if let Some(caps) = self.suite.captures(line) {
                suite_file = match text(&caps, "state") {
                    Some("FAIL") => text(&caps, "file"),
                    _ => None,
                };
                continue;
            }

            if let Some(caps) = self.pytest.captures(line) {
                let name = text(&caps, "name").unwrap_or_default();
                let message = match text(&caps, "msg") {
                    Some(msg) => format!("test failed: {name}: {msg}"),
                    None => format!("test failed: {name}"),
                };
                out.push(
                    RawMatch::new((i, i), ErrorType::Test, message)
                        .at(text(&caps, "file"), None, None)
                        .with_code(Some(name)),
                );
                continue;
            }

            if let Some(caps) = self.cargo.captures(line) {
                let name = text(&caps, "name").unwrap_or_default();
                out.push(
                    RawMatch::new((i, i), ErrorType::Test, format!("test failed: {name}"))
                        .with_code(Some(name)),
                );
                continue;
            }

            let caps = self.bullet.captures(line).or_else(|| self.cross.captures(line));
            if let Some(caps) = caps {
                let name = Self::test_name(text(&caps, "name").unwrap_or_default());
                out.push(
                    RawMatch::new((i, i), ErrorType::Test, format!("test failed: {name}"))
                        .at(suite_file, None, None)
                        .with_code(Some(name)),
                );
            }
        }
        out
    }
}

/// Built-in extractors in priority order.
pub fn default_extractors() -> Result<Vec<Box<dyn Extractor>>> {
    let extractors: Vec<Box<dyn Extractor>> = vec![
        Box::new(TypeScriptExtractor::new()?),
        Box::new(RustcExtractor::new()?),
        Box::new(CompilerExtractor::new()?),
        Box::new(LintExtractor::new()?),
        Box::new(PythonExtractor::new()?),
        Box::new(BuildExtractor::new()?),
        Box::new(StackTraceExtractor::new()?),
        Box::new(TestFailureExtractor::new()?),
    ];
    Ok(extractors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_tsc_both_forms() {
        let ex = TypeScriptExtractor::new().unwrap();
        let log = "src/a.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.\n\
                   src/b.ts:10:1 - error TS1005: ';' expected.";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].error_type, ErrorType::Type);
        assert_eq!(found[0].file.as_deref(), Some("src/a.ts"));
        assert_eq!((found[0].line, found[0].column), (Some(3), Some(7)));
        assert_eq!(found[0].code.as_deref(), Some("TS2322"));
        assert_eq!(found[1].error_type, ErrorType::Syntax);
    }

    #[test]
    fn test_rustc_header_with_arrow() {
        let ex = RustcExtractor::new().unwrap();
        let log = "error[E0308]: mismatched types\n  --> src/main.rs:4:18\n   |\n\
                   error: aborting due to 1 previous error";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, (0, 1));
        assert_eq!(found[0].file.as_deref(), Some("src/main.rs"));
        assert_eq!(found[0].error_type, ErrorType::Type);
    }

    #[test]
    fn test_eslint_stylish_block() {
        let ex = LintExtractor::new().unwrap();
        let log = "/repo/src/app.js\n  1:10  error  'foo' is defined but never used  no-unused-vars\n  \
                   4:1   warning  Unexpected console statement  no-console\n\n✖ 2 problems";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].code.as_deref(), Some("no-unused-vars"));
        assert_eq!(found[1].severity, Some(Severity::Warning));
        assert_eq!(found[1].file.as_deref(), Some("/repo/src/app.js"));
    }

    #[test]
    fn test_python_traceback_prefers_project_frame() {
        let ex = PythonExtractor::new().unwrap();
        let log = "Traceback (most recent call last):\n  File \"app/main.py\", line 12, in <module>\n    run()\n  \
                   File \"/usr/lib/python3.11/json/__init__.py\", line 346, in loads\n\
                   ValueError: bad input";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].error_type, ErrorType::Runtime);
        assert_eq!(found[0].file.as_deref(), Some("app/main.py"));
        assert_eq!(found[0].line, Some(12));
        assert_eq!(found[0].span, (0, 4));
    }

    #[test]
    fn test_stack_trace_skips_node_modules() {
        let ex = StackTraceExtractor::new().unwrap();
        let log = "TypeError: Cannot read properties of undefined (reading 'id')\n    \
                   at get (/app/node_modules/lodash/get.js:10:5)\n    at handler (/app/src/api.js:42:13)";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file.as_deref(), Some("/app/src/api.js"));
        assert_eq!(found[0].line, Some(42));
    }

    #[test]
    fn test_jest_failures_share_suite_file() {
        let ex = TestFailureExtractor::new().unwrap();
        let log = "FAIL src/math.test.ts\n  ✕ adds numbers (5 ms)\n\n  ● math › adds numbers";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.file.as_deref() == Some("src/math.test.ts")));
        assert!(found.iter().all(|m| m.code.as_deref() == Some("adds numbers")));
    }

    #[test]
    fn test_build_error_in_consumes_message_line() {
        let ex = BuildExtractor::new().unwrap();
        let log = "ERROR in ./src/index.js 3:0-25\nModule not found: Error: Can't resolve './missing' in '/app/src'";
        let found = ex.extract(&lines(log));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, (0, 1));
        assert_eq!(found[0].file.as_deref(), Some("src/index.js"));
    }
}
