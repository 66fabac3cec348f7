//! Flattening of structured alert payloads into classifiable text.

use serde_json::{Map, Value};

/// Fields whose contents are treated as log text.
const TEXT_FIELDS: [&str; 8] = [
    "message",
    "error",
    "log",
    "logs",
    "stack",
    "stacktrace",
    "output",
    "exception",
];

const MAX_DEPTH: usize = 8;

/// Flatten a payload into newline-separated text.
///
/// Strings are used verbatim. Objects contribute their well-known text
/// fields; exception objects carrying `type`/`value` (and optional
/// `stacktrace.frames`) are rendered as an error line plus V8-style frames,
/// innermost first.
pub fn flatten_payload(payload: &Value) -> String {
    let mut out = Vec::new();
    collect(payload, true, 0, &mut out);
    out.join("\n")
}

fn collect(value: &Value, in_text: bool, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::String(s) if in_text => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect(item, in_text, depth + 1, out);
            }
        }
        Value::Object(map) => {
            if let Some(lines) = render_exception(map) {
                out.extend(lines);
                return;
            }
            let mut matched = false;
            for field in TEXT_FIELDS {
                if let Some((_, v)) = map.iter().find(|(k, _)| k.eq_ignore_ascii_case(field)) {
                    matched = true;
                    collect(v, true, depth + 1, out);
                }
            }
            if !matched {
                for v in map.values().filter(|v| v.is_object() || v.is_array()) {
                    collect(v, false, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn render_exception(map: &Map<String, Value>) -> Option<Vec<String>> {
    let kind = map.get("type")?.as_str()?;
    let value = map.get("value")?.as_str()?;
    let mut lines = vec![format!("{kind}: {value}")];

    let frames = map
        .get("stacktrace")
        .and_then(|s| s.get("frames"))
        .and_then(Value::as_array);
    if let Some(frames) = frames {
        for frame in frames.iter().rev() {
            let file = frame
                .get("filename")
                .or_else(|| frame.get("abs_path"))
                .and_then(Value::as_str);
            let line = frame.get("lineno").and_then(Value::as_u64);
            let (Some(file), Some(line)) = (file, line) else {
                continue;
            };
            let col = frame.get("colno").and_then(Value::as_u64).unwrap_or(1);
            let function = frame
                .get("function")
                .and_then(Value::as_str)
                .unwrap_or("<anonymous>");
            lines.push(format!("    at {function} ({file}:{line}:{col})"));
        }
    }
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_payload_verbatim() {
        assert_eq!(flatten_payload(&json!("boom\nbang")), "boom\nbang");
    }

    #[test]
    fn test_known_fields_only() {
        let payload = json!({
            "id": "evt-1",
            "tags": ["prod"],
            "deployment": { "logs": ["line one", "line two"], "url": "https://x" },
            "message": "Build failed"
        });
        let text = flatten_payload(&payload);
        assert!(text.contains("Build failed"));
        assert!(text.contains("line one\nline two"));
        assert!(!text.contains("prod"));
        assert!(!text.contains("https://x"));
    }

    #[test]
    fn test_exception_frames_innermost_first() {
        let payload = json!({
            "event": { "exception": { "values": [{
                "type": "TypeError",
                "value": "x is undefined",
                "stacktrace": { "frames": [
                    { "filename": "src/outer.js", "lineno": 1, "colno": 1, "function": "main" },
                    { "filename": "src/inner.js", "lineno": 9, "colno": 3, "function": "load" }
                ]}
            }]}}
        });
        let text = flatten_payload(&payload);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TypeError: x is undefined");
        assert_eq!(lines[1], "    at load (src/inner.js:9:3)");
        assert_eq!(lines[2], "    at main (src/outer.js:1:1)");
    }
}
