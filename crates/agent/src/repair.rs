//! Structured-argument repair.
//!
//! Models routinely emit almost-JSON for tool arguments: fenced, with trailing
//! commas, bare keys, raw newlines in strings. [`repair_arguments`] applies a
//! fixed sequence of increasingly aggressive fixes and returns at the first
//! one that parses to an object.
//!
//! Each textual fix builds on the previous one, so input suffering from
//! several defects at once is still recovered.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Characters of the offending input quoted in a [`RepairError`].
const ERROR_PREFIX_CHARS: usize = 50;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("static trailing-comma pattern"));

static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):").expect("static bare-key pattern"));

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?([A-Za-z_][A-Za-z0-9_]*)["']?\s*:\s*("(?:[^"\\]|\\.)*"|'[^']*'|[^,}\n]+)"#)
        .expect("static key-value pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not parse tool arguments near: '{prefix}'")]
pub struct RepairError {
    pub prefix: String,
}

impl RepairError {
    fn new(input: &str) -> Self {
        Self {
            prefix: input.chars().take(ERROR_PREFIX_CHARS).collect(),
        }
    }
}

/// Parse model-authored tool arguments into a JSON object.
///
/// Empty or whitespace-only input is an empty object. Input that is valid
/// already comes back unchanged. Anything non-empty that cannot be recovered
/// is an error, never an empty map.
pub fn repair_arguments(raw: &str) -> Result<Value, RepairError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    if let Some(v) = parse_object(&text) {
        return Ok(v);
    }

    let text = TRAILING_COMMA.replace_all(&text, "$1").into_owned();
    if let Some(v) = parse_object(&text) {
        debug!("Tool arguments repaired: trailing commas");
        return Ok(v);
    }

    let text = BARE_KEY.replace_all(&text, "$1\"$2\"$3:").into_owned();
    if let Some(v) = parse_object(&text) {
        debug!("Tool arguments repaired: bare keys");
        return Ok(v);
    }

    let text = escape_control_chars_in_strings(&text);
    if let Some(v) = parse_object(&text) {
        debug!("Tool arguments repaired: raw control characters");
        return Ok(v);
    }

    if let Some(v) = extract_pairs(&strip_fences(raw)) {
        debug!("Tool arguments repaired: key/value extraction");
        return Ok(v);
    }

    Err(RepairError::new(raw.trim()))
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text).ok().filter(Value::is_object)
}

/// Drop a surrounding Markdown code fence, with or without a language tag.
fn strip_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(nl) if !rest[..nl].contains('{') => &rest[nl + 1..],
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    text.trim_end().trim_end_matches("```").trim().to_string()
}

/// Escape literal newlines, carriage returns and tabs inside string literals.
fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Last resort: pull `key: value` pairs out of whatever the model wrote.
fn extract_pairs(text: &str) -> Option<Value> {
    let mut map = Map::new();
    for caps in KEY_VALUE.captures_iter(text) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        map.insert(key.as_str().to_string(), scalar(value.as_str()));
    }
    (!map.is_empty()).then_some(Value::Object(map))
}

fn scalar(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw[1..raw.len() - 1].to_string()));
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_is_empty_object() {
        assert_eq!(repair_arguments("").unwrap(), json!({}));
        assert_eq!(repair_arguments("  \n ").unwrap(), json!({}));
    }

    #[test]
    fn valid_input_is_unchanged() {
        let raw = r#"{"path": "src/a.ts", "content": "line1\nline2", "n": [1, 2]}"#;
        let once = repair_arguments(raw).unwrap();
        assert_eq!(once, serde_json::from_str::<Value>(raw).unwrap());
        let twice = repair_arguments(&once.to_string()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"path\": \"a.ts\"}\n```";
        assert_eq!(repair_arguments(raw).unwrap(), json!({"path": "a.ts"}));
        assert_eq!(repair_arguments("```{\"a\": 1}```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn removes_trailing_commas() {
        let raw = r#"{"tags": ["a", "b",], "content": "x",}"#;
        assert_eq!(repair_arguments(raw).unwrap(), json!({"tags": ["a", "b"], "content": "x"}));
    }

    #[test]
    fn quotes_bare_keys() {
        let raw = r#"{path: "a.ts", start_line: 3}"#;
        assert_eq!(repair_arguments(raw).unwrap(), json!({"path": "a.ts", "start_line": 3}));
    }

    #[test]
    fn escapes_raw_newlines_in_strings() {
        let raw = "{\"path\": \"a.ts\", \"content\": \"fn main() {\n\tprintln!();\n}\"}";
        let v = repair_arguments(raw).unwrap();
        assert_eq!(v["content"], "fn main() {\n\tprintln!();\n}");
    }

    #[test]
    fn combined_defects_recovered() {
        let raw = "```\n{path: \"a.ts\", content: \"x\ny\",}\n```";
        assert_eq!(repair_arguments(raw).unwrap(), json!({"path": "a.ts", "content": "x\ny"}));
    }

    #[test]
    fn falls_back_to_pair_extraction() {
        let raw = "path: 'src/app.ts', start_line: 4, end_line: 9";
        assert_eq!(
            repair_arguments(raw).unwrap(),
            json!({"path": "src/app.ts", "start_line": 4, "end_line": 9})
        );
    }

    #[test]
    fn unparseable_input_is_an_error() {
        let raw = "I would like to read the login file please, it is very important to me and the team";
        let err = repair_arguments(raw).unwrap_err();
        assert_eq!(err.prefix.chars().count(), 50);
        assert!(raw.starts_with(&err.prefix));
        assert!(err.to_string().contains("Could not parse"));
    }

    #[test]
    fn non_object_json_is_an_error() {
        assert!(repair_arguments("[1, 2, 3]").is_err());
        assert!(repair_arguments("42").is_err());
    }
}
