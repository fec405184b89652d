//! Parameter auto-fix for failed tool calls.
//!
//! Deterministic and best-effort: given the failed arguments and the error,
//! propose at most one corrected argument map. When a heuristic finds more
//! than one plausible correction it refuses rather than guessing.

use std::sync::LazyLock;

use codeweave_core::error::ToolError;
use codeweave_core::file::FileSnapshot;
use regex::Regex;
use serde_json::{Value, json};

static MISSING_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"missing field `(\w+)`").expect("static missing-field pattern"));

/// Keys the model uses for the target file, in lookup order.
const PATH_KEYS: &[&str] = &["path", "file_name", "filename", "file", "file_path"];

/// Shortest string a fuzzy match may hinge on.
const MIN_FUZZY_LEN: usize = 3;

/// A corrected argument map and a note describing the correction.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub arguments: Value,
    pub note: String,
}

/// Propose a corrected re-invocation of `tool`, if one is safe.
pub fn suggest(tool: &str, arguments: &Value, error: &ToolError, snapshot: &FileSnapshot) -> Option<Fix> {
    match error {
        ToolError::FileNotFound { file_name } => {
            let resolved = resolve_file_name(file_name, snapshot)?;
            let mut args = as_object(arguments);
            let key = PATH_KEYS
                .iter()
                .find(|k| args.get(**k).is_some_and(|v| v.as_str() == Some(file_name.as_str())))
                .copied()
                .unwrap_or("path");
            args[key] = json!(resolved);
            Some(Fix {
                arguments: args,
                note: format!("'{file_name}' resolved to '{resolved}'"),
            })
        }
        ToolError::LineOutOfRange { start, end, total, .. } => {
            if *total == 0 {
                return None;
            }
            let start_line = (*start).clamp(1, *total);
            let end_line = (*end).clamp(start_line, *total);
            let mut args = as_object(arguments);
            args["start_line"] = json!(start_line);
            args["end_line"] = json!(end_line);
            Some(Fix {
                arguments: args,
                note: format!("line range {start}-{end} clamped to {start_line}-{end_line}"),
            })
        }
        ToolError::InvalidArguments(message) => {
            let field = MISSING_FIELD.captures(message)?.get(1)?.as_str();
            let default = default_for(tool, field)?;
            let mut args = as_object(arguments);
            args[field] = default.clone();
            Some(Fix {
                arguments: args,
                note: format!("missing '{field}' defaulted to {default}"),
            })
        }
        _ => None,
    }
}

fn as_object(arguments: &Value) -> Value {
    if arguments.is_object() { arguments.clone() } else { json!({}) }
}

/// Safe defaults for required arguments the model commonly drops.
///
/// `content` only defaults for new files; an empty `update_file` would
/// propose wiping the existing file.
fn default_for(tool: &str, field: &str) -> Option<Value> {
    match field {
        "content" if tool == "create_file" => Some(json!("")),
        "content" => None,
        "start_line" => Some(json!(1)),
        "action" => Some(json!("list")),
        "tags" => Some(json!([])),
        _ => None,
    }
}

/// Resolve a name that is not in the snapshot to exactly one that is.
///
/// Tries, in order: case-insensitive exact match, conventional prefix
/// variants (`./`, leading `/`, `src/`), then bidirectional substring match.
/// Returns `None` when nothing matches or when a step is ambiguous.
pub fn resolve_file_name(requested: &str, snapshot: &FileSnapshot) -> Option<String> {
    let requested = requested.trim().replace('\\', "/");
    if requested.is_empty() {
        return None;
    }
    let names = snapshot.names();

    if let Some(hit) = unique(names.iter().filter(|n| n.eq_ignore_ascii_case(&requested))) {
        return Some(hit);
    }

    let stripped = requested.trim_start_matches("./").trim_start_matches('/');
    let variants = [
        stripped.to_string(),
        format!("src/{stripped}"),
        stripped.strip_prefix("src/").unwrap_or(stripped).to_string(),
    ];
    for variant in variants.iter().filter(|v| **v != requested) {
        if snapshot.contains(variant) {
            return Some(variant.clone());
        }
    }

    let needle = stripped.to_lowercase();
    let fuzzy = names.iter().filter(|n| {
        let hay = n.to_lowercase();
        (needle.len() >= MIN_FUZZY_LEN && hay.contains(&needle))
            || (hay.len() >= MIN_FUZZY_LEN && needle.contains(&hay))
    });
    let hit = unique(fuzzy);
    if hit.is_none() {
        tracing::debug!(requested = %requested, "No unique fuzzy file match");
    }
    hit
}

/// The single item of an iterator, or `None` for zero or several.
fn unique<S: AsRef<str>>(mut it: impl Iterator<Item = S>) -> Option<String> {
    let first = it.next()?;
    match it.next() {
        None => Some(first.as_ref().to_string()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweave_core::file::ProjectFile;

    fn snapshot() -> FileSnapshot {
        FileSnapshot::new(vec![
            ProjectFile::new("src/components/Button.tsx", ""),
            ProjectFile::new("src/components/ButtonGroup.tsx", ""),
            ProjectFile::new("src/utils/format.ts", ""),
            ProjectFile::new("README.md", ""),
        ])
    }

    #[test]
    fn prefix_variant_resolves() {
        assert_eq!(resolve_file_name("utils/format.ts", &snapshot()).as_deref(), Some("src/utils/format.ts"));
        assert_eq!(resolve_file_name("./README.md", &snapshot()).as_deref(), Some("README.md"));
        assert_eq!(resolve_file_name("readme.md", &snapshot()).as_deref(), Some("README.md"));
    }

    #[test]
    fn fuzzy_unique_candidate_resolves() {
        assert_eq!(resolve_file_name("format.ts", &snapshot()).as_deref(), Some("src/utils/format.ts"));
        // requested contains the snapshot name
        assert_eq!(
            resolve_file_name("app/src/utils/format.ts", &snapshot()).as_deref(),
            Some("src/utils/format.ts")
        );
    }

    #[test]
    fn fuzzy_tie_refuses_to_guess() {
        // "Button" is a substring of both Button.tsx and ButtonGroup.tsx
        assert_eq!(resolve_file_name("Button", &snapshot()), None);
    }

    #[test]
    fn unrelated_name_not_resolved() {
        assert_eq!(resolve_file_name("auth.ts", &snapshot()), None);
    }

    #[test]
    fn not_found_fix_rewrites_the_key_used() {
        let err = ToolError::FileNotFound { file_name: "format.ts".into() };
        let args = json!({"file_name": "format.ts", "content": "x"});
        let fix = suggest("update_file", &args, &err, &snapshot()).unwrap();
        assert_eq!(fix.arguments["file_name"], "src/utils/format.ts");
        assert_eq!(fix.arguments["content"], "x");
        assert!(fix.note.contains("resolved to"));
    }

    #[test]
    fn line_range_is_clamped() {
        let err = ToolError::LineOutOfRange { file_name: "a".into(), start: 0, end: 99, total: 12 };
        let args = json!({"path": "a", "start_line": 0, "end_line": 99});
        let fix = suggest("read_file_lines", &args, &err, &snapshot()).unwrap();
        assert_eq!(fix.arguments["start_line"], 1);
        assert_eq!(fix.arguments["end_line"], 12);

        let err = ToolError::LineOutOfRange { file_name: "a".into(), start: 50, end: 60, total: 12 };
        let fix = suggest("read_file_lines", &json!({"path": "a"}), &err, &snapshot()).unwrap();
        assert_eq!(fix.arguments["start_line"], 12);
        assert_eq!(fix.arguments["end_line"], 12);
    }

    #[test]
    fn empty_file_range_not_fixable() {
        let err = ToolError::LineOutOfRange { file_name: "a".into(), start: 1, end: 1, total: 0 };
        assert!(suggest("read_file", &json!({}), &err, &snapshot()).is_none());
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        let err = ToolError::InvalidArguments("create_file: missing field `content`".into());
        let fix = suggest("create_file", &json!({"path": "new.ts"}), &err, &snapshot()).unwrap();
        assert_eq!(fix.arguments, json!({"path": "new.ts", "content": ""}));
    }

    #[test]
    fn missing_update_content_is_not_defaulted() {
        let err = ToolError::InvalidArguments("update_file: missing field `content`".into());
        assert!(suggest("update_file", &json!({"path": "src/utils/format.ts"}), &err, &snapshot()).is_none());
    }

    #[test]
    fn missing_path_has_no_safe_default() {
        let err = ToolError::InvalidArguments("read_file: missing field `path`".into());
        assert!(suggest("read_file", &json!({}), &err, &snapshot()).is_none());
    }

    #[test]
    fn blocked_is_never_fixed() {
        let err = ToolError::Blocked { path: ".env".into() };
        assert!(suggest("update_file", &json!({"path": ".env"}), &err, &snapshot()).is_none());
    }
}
