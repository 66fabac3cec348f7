//! Built-in syntax stage.
//!
//! JSON and TOML files are parsed. Brace languages are checked for balanced
//! `()`, `[]` and `{}` outside strings and comments. Other files pass.

use crate::domain::FileChange;
use crate::provider::ToolOutcome;

/// Check the modified content of every change.
pub fn check_changes(changes: &[FileChange]) -> ToolOutcome {
    let errors: Vec<String> = changes
        .iter()
        .filter_map(|c| check_source(&c.path, &c.modified))
        .collect();
    if errors.is_empty() {
        ToolOutcome::pass()
    } else {
        ToolOutcome::fail(errors)
    }
}

/// First syntax problem in `content`, formatted as `path:line:col: message`.
pub fn check_source(path: &str, content: &str) -> Option<String> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    match ext.as_str() {
        "json" => serde_json::from_str::<serde_json::Value>(content)
            .err()
            .map(|e| format!("{path}:{}:{}: invalid JSON: {e}", e.line(), e.column())),
        "toml" => toml::from_str::<toml::Table>(content)
            .err()
            .map(|e| format!("{path}: invalid TOML: {}", e.message())),
        _ => Dialect::for_extension(&ext)
            .and_then(|dialect| check_delimiters(content, dialect))
            .map(|(line, col, msg)| format!("{path}:{line}:{col}: {msg}")),
    }
}

#[derive(Debug, Clone, Copy)]
struct Dialect {
    /// `'...'` is a string rather than a char literal or lifetime.
    single_quote_strings: bool,
    backtick_strings: bool,
    line_comments: bool,
    /// `r"..."` and `r#"..."#`.
    raw_strings: bool,
    /// `/.../flags` in expression position.
    regex_literals: bool,
}

impl Dialect {
    fn for_extension(ext: &str) -> Option<Self> {
        let dialect = match ext {
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => Self {
                single_quote_strings: true,
                backtick_strings: true,
                line_comments: true,
                raw_strings: false,
                regex_literals: true,
            },
            "php" | "scss" | "less" => Self {
                single_quote_strings: true,
                backtick_strings: false,
                line_comments: true,
                raw_strings: false,
                regex_literals: false,
            },
            "css" => Self {
                single_quote_strings: true,
                backtick_strings: false,
                line_comments: false,
                raw_strings: false,
                regex_literals: false,
            },
            "rs" | "go" | "java" | "kt" | "kts" | "scala" | "swift" | "c" | "h" | "cc" | "cpp"
            | "hpp" | "cs" | "dart" => Self {
                single_quote_strings: false,
                backtick_strings: ext == "go",
                line_comments: true,
                raw_strings: ext == "rs",
                regex_literals: false,
            },
            _ => return None,
        };
        Some(dialect)
    }
}

/// Returns `(line, column, message)` of the first imbalance.
fn check_delimiters(content: &str, dialect: Dialect) -> Option<(usize, usize, String)> {
    let chars: Vec<char> = content.chars().collect();
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let (mut line, mut col) = (1usize, 0usize);
    let mut i = 0;

    // Advance one char, tracking position.
    macro_rules! bump {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if dialect.line_comments && c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                bump!();
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            bump!();
            bump!();
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                bump!();
            }
            if i < chars.len() {
                bump!();
                bump!();
            }
            continue;
        }

        if dialect.raw_strings && c == 'r' && !follows_identifier(&chars, i) {
            if let Some(hashes) = raw_string_hashes(&chars, i + 1) {
                // Opening `r`, hashes and quote.
                for _ in 0..hashes + 2 {
                    bump!();
                }
                while i < chars.len() && !closes_raw_string(&chars, i, hashes) {
                    bump!();
                }
                for _ in 0..hashes + 1 {
                    if i < chars.len() {
                        bump!();
                    }
                }
                continue;
            }
        }

        if dialect.regex_literals && c == '/' && starts_expression(&chars, i) {
            bump!();
            let mut in_class = false;
            while i < chars.len() && chars[i] != '\n' {
                match chars[i] {
                    '\\' => {
                        bump!();
                        if i >= chars.len() || chars[i] == '\n' {
                            break;
                        }
                    }
                    '[' => in_class = true,
                    ']' => in_class = false,
                    '/' if !in_class => break,
                    _ => {}
                }
                bump!();
            }
            if i < chars.len() && chars[i] == '/' {
                bump!();
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    bump!();
                }
            }
            continue;
        }

        let quote = c == '"'
            || (c == '`' && dialect.backtick_strings)
            || (c == '\'' && dialect.single_quote_strings);
        if quote {
            bump!();
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    bump!();
                    if i >= chars.len() {
                        break;
                    }
                } else if chars[i] == '\n' && c != '`' && c != '"' {
                    break;
                }
                bump!();
            }
            if i < chars.len() && chars[i] == c {
                bump!();
            }
            continue;
        }

        if c == '\'' {
            // Char literal (`'x'`, `'\n'`) or a lifetime/label.
            if next == Some('\\') {
                bump!();
                bump!();
                while i < chars.len() && chars[i] != '\'' && chars[i] != '\n' {
                    bump!();
                }
                if i < chars.len() && chars[i] == '\'' {
                    bump!();
                }
                continue;
            }
            if chars.get(i + 2) == Some(&'\'') {
                bump!();
                bump!();
                bump!();
                continue;
            }
            bump!();
            continue;
        }

        col += 1;
        match c {
            '(' | '[' | '{' => stack.push((c, line, col)),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((o, _, _)) if o == open => {}
                    Some((o, l, cl)) => {
                        return Some((
                            line,
                            col,
                            format!("mismatched `{c}`, expected closer for `{o}` opened at {l}:{cl}"),
                        ));
                    }
                    None => return Some((line, col, format!("unexpected `{c}`"))),
                }
            }
            '\n' => {
                line += 1;
                col = 0;
            }
            _ => {}
        }
        i += 1;
    }

    stack
        .pop()
        .map(|(o, l, cl)| (l, cl, format!("unclosed `{o}`")))
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `chars[i]` continues an identifier, allowing the `br` prefix.
fn follows_identifier(chars: &[char], i: usize) -> bool {
    match i.checked_sub(1).map(|p| chars[p]) {
        Some('b') => i >= 2 && is_ident(chars[i - 2]),
        Some(p) => is_ident(p),
        None => false,
    }
}

/// Number of `#`s when `chars[from..]` opens a raw string body.
fn raw_string_hashes(chars: &[char], from: usize) -> Option<usize> {
    let hashes = chars[from.min(chars.len())..]
        .iter()
        .take_while(|&&c| c == '#')
        .count();
    (chars.get(from + hashes) == Some(&'"')).then_some(hashes)
}

fn closes_raw_string(chars: &[char], i: usize, hashes: usize) -> bool {
    chars[i] == '"' && (1..=hashes).all(|k| chars.get(i + k) == Some(&'#'))
}

const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return", "typeof", "case", "in", "of", "void", "delete", "instanceof", "new", "throw",
    "yield", "await",
];

/// A `/` at `i` that is not a comment opens a regex when the previous
/// token cannot end an operand.
fn starts_expression(chars: &[char], i: usize) -> bool {
    if matches!(chars.get(i + 1), Some('/') | Some('*')) {
        return false;
    }
    let mut j = i;
    while j > 0 && chars[j - 1].is_whitespace() {
        j -= 1;
    }
    let Some(&prev) = j.checked_sub(1).and_then(|p| chars.get(p)) else {
        return true;
    };
    if is_ident(prev) {
        let end = j;
        while j > 0 && is_ident(chars[j - 1]) {
            j -= 1;
        }
        let word: String = chars[j..end].iter().collect();
        return REGEX_PRECEDING_WORDS.contains(&word.as_str());
    }
    !matches!(prev, ')' | ']' | '}' | '"' | '\'' | '`' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_typescript_passes() {
        let src = "function f(a: string) {\n  const s = \"}\"; // )\n  return `${a}]`;\n}\n";
        assert_eq!(check_source("src/f.ts", src), None);
    }

    #[test]
    fn test_unclosed_brace_reported_at_opener() {
        let src = "fn main() {\n    let x = vec![1, 2];\n";
        let err = check_source("src/main.rs", src).expect("unbalanced");
        assert!(err.starts_with("src/main.rs:1:11: unclosed `{`"), "{err}");
    }

    #[test]
    fn test_rust_lifetimes_and_chars() {
        let src = "fn f<'a>(s: &'a str) -> char { let _ = '{'; '\\n' }\n";
        assert_eq!(check_source("lib.rs", src), None);
    }

    #[test]
    fn test_mismatched_closer() {
        let err = check_source("a.js", "call(a];").expect("mismatch");
        assert!(err.contains("mismatched `]`"), "{err}");
    }

    #[test]
    fn test_json_and_toml() {
        assert!(check_source("package.json", "{\"a\": 1,}").is_some());
        assert_eq!(check_source("package.json", "{\"a\": 1}"), None);
        assert!(check_source("Cargo.toml", "[package\nname = 1").is_some());
        assert_eq!(check_source("Cargo.toml", "[package]\nname = \"x\"\n"), None);
    }

    #[test]
    fn test_rust_raw_strings() {
        let src = "fn f() {\n    let re = r#\"File \"(?P<file>[^\"]+)\"\"#;\n    let p = r\"C:\\[\";\n    let b = br##\"}\"#\"##;\n}\n";
        assert_eq!(check_source("x.rs", src), None);
        // An identifier ending in `r` is not a raw string prefix.
        let err = check_source("x.rs", "fn f() { let bar = 1; let s = \"(\"; [\n").expect("unclosed");
        assert!(err.contains("unclosed `[`"), "{err}");
    }

    #[test]
    fn test_js_regex_literals() {
        let src = "function f(s) {\n  return s.replace(/[\"(]/g, '');\n}\nconst re = /\\}[/]x/i;\nconst half = (a) / 2 / [1][0];\n";
        assert_eq!(check_source("x.js", src), None);
        let err = check_source("x.ts", "const n = a / (b;\n").expect("unclosed");
        assert!(err.contains("unclosed `(`"), "{err}");
    }

    #[test]
    fn test_unknown_extension_passes() {
        assert_eq!(check_source("README.md", "((("), None);
        assert_eq!(check_source("Makefile", "((("), None);
    }
}
