//! Line-range splicing and unified diffs.

use similar::TextDiff;

/// Replace lines `start..=end` (1-indexed) of `content` with `replacement`.
///
/// `end < start` inserts `replacement` before line `start`; `start` may be
/// one past the last line to append. Ranges outside the file are rejected
/// with a human-readable reason.
pub fn splice_lines(
    content: &str,
    start: u32,
    end: u32,
    replacement: &str,
) -> Result<String, String> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let n = lines.len();
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let start = start as usize;
    let end = end as usize;

    if start == 0 {
        return Err("line numbers start at 1".to_string());
    }

    let (cut_from, cut_to) = if end >= start {
        if end > n {
            return Err(format!("lines {start}-{end} out of range (file has {n} lines)"));
        }
        (start - 1, end)
    } else {
        if start > n + 1 {
            return Err(format!("insert position {start} out of range (file has {n} lines)"));
        }
        (start - 1, start - 1)
    };

    let mut out = String::with_capacity(content.len() + replacement.len());
    for line in &lines[..cut_from] {
        out.push_str(line);
    }

    if !replacement.is_empty() {
        // Appending after a final line that has no terminator.
        if cut_from == n && n > 0 && !lines[n - 1].ends_with('\n') {
            out.push_str(newline);
        }
        out.push_str(replacement);
        let needs_terminator = if cut_to < n {
            true
        } else if cut_to > cut_from {
            lines[cut_to - 1].ends_with('\n')
        } else {
            cut_from > 0 && lines[cut_from - 1].ends_with('\n')
        };
        if needs_terminator && !replacement.ends_with('\n') {
            out.push_str(newline);
        }
    }

    for line in &lines[cut_to..] {
        out.push_str(line);
    }
    Ok(out)
}

/// Unified diff between two versions of `path`.
pub fn unified_diff(path: &str, original: &str, modified: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "one\ntwo\nthree\n";

    #[test]
    fn test_replace_single_line() {
        assert_eq!(splice_lines(SRC, 2, 2, "TWO").unwrap(), "one\nTWO\nthree\n");
    }

    #[test]
    fn test_replace_range_with_multiple_lines() {
        assert_eq!(
            splice_lines(SRC, 1, 2, "a\nb\nc\n").unwrap(),
            "a\nb\nc\nthree\n"
        );
    }

    #[test]
    fn test_delete_lines() {
        assert_eq!(splice_lines(SRC, 2, 3, "").unwrap(), "one\n");
    }

    #[test]
    fn test_insert_before_and_append() {
        assert_eq!(splice_lines(SRC, 1, 0, "zero").unwrap(), "zero\none\ntwo\nthree\n");
        assert_eq!(splice_lines(SRC, 4, 3, "four").unwrap(), "one\ntwo\nthree\nfour\n");
        assert_eq!(splice_lines("last", 2, 1, "next").unwrap(), "last\nnext");
    }

    #[test]
    fn test_last_line_without_newline_keeps_shape() {
        assert_eq!(splice_lines("a\nb", 2, 2, "B").unwrap(), "a\nB");
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(splice_lines(SRC, 3, 9, "x").is_err());
        assert!(splice_lines(SRC, 0, 1, "x").is_err());
        assert!(splice_lines(SRC, 6, 5, "x").is_err());
    }

    #[test]
    fn test_crlf_preserved() {
        assert_eq!(splice_lines("a\r\nb\r\n", 1, 1, "A").unwrap(), "A\r\nb\r\n");
    }

    #[test]
    fn test_unified_diff_headers() {
        let diff = unified_diff("src/a.ts", SRC, "one\nTWO\nthree\n");
        assert!(diff.contains("--- a/src/a.ts"));
        assert!(diff.contains("+++ b/src/a.ts"));
        assert!(diff.contains("-two"));
        assert!(diff.contains("+TWO"));
    }
}
