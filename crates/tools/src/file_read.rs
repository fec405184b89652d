//! Read-only file operations over the snapshot.

use codeweave_core::error::ToolError;
use codeweave_core::file::FileSnapshot;
use codeweave_core::tool::ToolExecutionResult;
use serde_json::json;

use crate::request::{LineRangeArgs, ListArgs, PathArgs, SearchArgs};

/// Longest line echoed back in a search hit.
const MAX_HIT_CHARS: usize = 200;

pub fn list_files(snapshot: &FileSnapshot, args: &ListArgs) -> ToolExecutionResult {
    let filter = args.pattern.as_deref().map(str::to_lowercase).filter(|p| !p.is_empty());
    let lines: Vec<String> = snapshot
        .files()
        .iter()
        .filter(|f| filter.as_ref().is_none_or(|p| f.name.to_lowercase().contains(p)))
        .map(|f| format!("{} ({}, {} lines)", f.name, f.language, f.line_count()))
        .collect();

    if lines.is_empty() {
        return ToolExecutionResult::text("No files match.");
    }
    ToolExecutionResult::text(format!("{} file(s):\n{}", lines.len(), lines.join("\n")))
}

/// Case-insensitive substring search, capped at `cap` hits.
pub fn search_files(snapshot: &FileSnapshot, args: &SearchArgs, cap: usize) -> ToolExecutionResult {
    let needle = args.query.to_lowercase();
    let file_filter = args.file_pattern.as_deref().map(str::to_lowercase).filter(|p| !p.is_empty());

    let mut hits = Vec::new();
    let mut truncated = false;
    'files: for file in snapshot.files() {
        if let Some(p) = &file_filter
            && !file.name.to_lowercase().contains(p)
        {
            continue;
        }
        for (i, line) in file.content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                if hits.len() == cap {
                    truncated = true;
                    break 'files;
                }
                let text: String = line.trim().chars().take(MAX_HIT_CHARS).collect();
                hits.push(json!({ "file": file.name, "line": i + 1, "text": text }));
            }
        }
    }

    if hits.is_empty() {
        return ToolExecutionResult::text(format!("No matches for '{}'.", args.query));
    }

    let mut output = format!("{} match(es) for '{}':\n", hits.len(), args.query);
    for h in &hits {
        output.push_str(&format!(
            "{}:{}: {}\n",
            h["file"].as_str().unwrap_or_default(),
            h["line"],
            h["text"].as_str().unwrap_or_default()
        ));
    }
    if truncated {
        output.push_str(&format!("(results truncated at {cap}; refine the query)\n"));
    }
    ToolExecutionResult::text(output.trim_end()).with_metadata(json!({ "matches": hits, "truncated": truncated }))
}

pub fn read_file(snapshot: &FileSnapshot, args: &PathArgs) -> Result<ToolExecutionResult, ToolError> {
    let file = snapshot.get(&args.path).ok_or_else(|| ToolError::FileNotFound {
        file_name: args.path.clone(),
    })?;
    Ok(ToolExecutionResult::text(format!(
        "Contents of {} ({} lines):\n{}",
        file.name,
        file.line_count(),
        file.content
    )))
}

/// Inclusive, 1-based range. A missing end reads to end of file.
pub fn read_file_lines(snapshot: &FileSnapshot, args: &LineRangeArgs) -> Result<ToolExecutionResult, ToolError> {
    let file = snapshot.get(&args.path).ok_or_else(|| ToolError::FileNotFound {
        file_name: args.path.clone(),
    })?;

    let lines: Vec<&str> = file.content.lines().collect();
    let total = lines.len();
    let start = args.start_line;
    let end = args.end_line.unwrap_or(total);

    if start == 0 || start > end || end > total {
        return Err(ToolError::LineOutOfRange {
            file_name: file.name.clone(),
            start,
            end,
            total,
        });
    }

    let width = end.to_string().len();
    let body: Vec<String> = lines[start - 1..end]
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{:>width$} | {l}", start + i))
        .collect();
    Ok(ToolExecutionResult::text(format!(
        "{} lines {start}-{end} of {total}:\n{}",
        file.name,
        body.join("\n")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweave_core::file::ProjectFile;

    fn snapshot() -> FileSnapshot {
        FileSnapshot::new(vec![
            ProjectFile::new("src/login.ts", "import { api } from './api';\nexport function login() {\n  return api.post('/Login');\n}\n"),
            ProjectFile::new("src/api.ts", "export const api = makeClient();\n"),
        ])
    }

    #[test]
    fn list_filters_by_pattern() {
        let out = list_files(&snapshot(), &ListArgs { pattern: Some("LOGIN".into()) }).output;
        assert!(out.contains("src/login.ts (typescript, 4 lines)"));
        assert!(!out.contains("src/api.ts"));
    }

    #[test]
    fn search_is_case_insensitive() {
        let args = SearchArgs { query: "login".into(), file_pattern: None };
        let result = search_files(&snapshot(), &args, 20);
        assert!(result.output.contains("src/login.ts:2:"));
        assert!(result.output.contains("src/login.ts:3:"));
        assert_eq!(result.metadata.unwrap()["matches"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn search_caps_results() {
        let big = (0..50).map(|i| format!("todo {i}")).collect::<Vec<_>>().join("\n");
        let snap = FileSnapshot::new(vec![ProjectFile::new("notes.txt", big)]);
        let args = SearchArgs { query: "TODO".into(), file_pattern: None };
        let result = search_files(&snap, &args, 20);
        let meta = result.metadata.unwrap();
        assert_eq!(meta["matches"].as_array().unwrap().len(), 20);
        assert_eq!(meta["truncated"], true);
        assert!(result.output.contains("truncated at 20"));
    }

    #[test]
    fn search_without_hits() {
        let args = SearchArgs { query: "nothing-here".into(), file_pattern: None };
        assert!(search_files(&snapshot(), &args, 20).output.starts_with("No matches"));
    }

    #[test]
    fn read_missing_file() {
        let err = read_file(&snapshot(), &PathArgs { path: "login.ts".into() }).unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound { .. }));
    }

    #[test]
    fn read_line_range_numbers_lines() {
        let args = LineRangeArgs { path: "src/login.ts".into(), start_line: 2, end_line: Some(3) };
        let out = read_file_lines(&snapshot(), &args).unwrap().output;
        assert!(out.contains("2 | export function login() {"));
        assert!(out.contains("3 |   return api.post('/Login');"));
        assert!(!out.contains("import"));
    }

    #[test]
    fn read_line_range_defaults_to_eof() {
        let args = LineRangeArgs { path: "src/login.ts".into(), start_line: 4, end_line: None };
        let out = read_file_lines(&snapshot(), &args).unwrap().output;
        assert!(out.contains("lines 4-4 of 4"));
    }

    #[test]
    fn read_line_range_out_of_bounds() {
        let args = LineRangeArgs { path: "src/login.ts".into(), start_line: 3, end_line: Some(40) };
        let err = read_file_lines(&snapshot(), &args).unwrap_err();
        assert!(matches!(err, ToolError::LineOutOfRange { total: 4, .. }));
    }
}
