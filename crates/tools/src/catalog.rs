//! The fixed operation catalog and its JSON Schema definitions.

use codeweave_core::provider::ToolDefinition;
use serde_json::{Value, json};

/// Static facts about one catalog operation.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Read-only, order-independent operations may run concurrently within a turn.
    pub read_only: bool,
}

pub const CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "create_file",
        description: "Create a new file with the given full content. Overwrites the file if it already exists.",
        read_only: false,
    },
    ToolSpec {
        name: "update_file",
        description: "Replace the entire content of an existing file. Always send the complete new file, not a fragment.",
        read_only: false,
    },
    ToolSpec {
        name: "delete_file",
        description: "Delete an existing file.",
        read_only: false,
    },
    ToolSpec {
        name: "list_files",
        description: "List project files with language and line count, optionally filtered by a name substring.",
        read_only: true,
    },
    ToolSpec {
        name: "search_files",
        description: "Case-insensitive substring search across file contents. Returns matching lines as file:line: text.",
        read_only: true,
    },
    ToolSpec {
        name: "read_file",
        description: "Read the full content of a file.",
        read_only: true,
    },
    ToolSpec {
        name: "read_file_lines",
        description: "Read an inclusive, 1-based line range of a file.",
        read_only: true,
    },
    ToolSpec {
        name: "save_knowledge",
        description: "Persist a reusable insight (convention, pitfall, preference) with tags for future requests.",
        read_only: true,
    },
    ToolSpec {
        name: "manage_tasks",
        description: "Maintain the task list: add, update, complete, remove, or list tasks.",
        read_only: false,
    },
    ToolSpec {
        name: "analyze_dependencies",
        description: "Report imports per file and declared package dependencies.",
        read_only: true,
    },
    ToolSpec {
        name: "scan_security",
        description: "Heuristic scan for hardcoded secrets, injection risks, and unsafe APIs.",
        read_only: true,
    },
    ToolSpec {
        name: "review_code",
        description: "Heuristic code review: long lines, leftover debug output, TODO markers, oversized files.",
        read_only: true,
    },
    ToolSpec {
        name: "analyze_performance",
        description: "Heuristic scan for nested loops, blocking I/O, and work repeated inside loops.",
        read_only: true,
    },
];

/// Map common misspellings the model produces onto catalog names.
pub fn canonical_name(name: &str) -> &str {
    match name.trim() {
        "write_file" | "new_file" => "create_file",
        "edit_file" | "modify_file" | "replace_file" => "update_file",
        "remove_file" => "delete_file",
        "search" | "grep" | "search_code" => "search_files",
        "read_lines" | "read_file_range" => "read_file_lines",
        "tasks" | "update_tasks" => "manage_tasks",
        other => other,
    }
}

/// Look up an operation, resolving aliases.
pub fn spec(name: &str) -> Option<&'static ToolSpec> {
    let name = canonical_name(name);
    CATALOG.iter().find(|s| s.name == name)
}

/// Unknown names are treated as mutating so they never join a concurrent batch.
pub fn is_read_only(name: &str) -> bool {
    spec(name).is_some_and(|s| s.read_only)
}

pub fn names() -> Vec<&'static str> {
    CATALOG.iter().map(|s| s.name).collect()
}

/// Definitions for every catalog operation, in catalog order.
pub fn definitions() -> Vec<ToolDefinition> {
    CATALOG
        .iter()
        .map(|s| ToolDefinition {
            name: s.name.to_string(),
            description: s.description.to_string(),
            parameters: parameters_schema(s.name),
        })
        .collect()
}

fn path_prop() -> Value {
    json!({ "type": "string", "description": "Project-relative file name, exactly as listed" })
}

fn parameters_schema(name: &str) -> Value {
    match name {
        "create_file" | "update_file" => json!({
            "type": "object",
            "properties": {
                "path": path_prop(),
                "content": { "type": "string", "description": "The complete file content" }
            },
            "required": ["path", "content"]
        }),
        "delete_file" | "read_file" => json!({
            "type": "object",
            "properties": { "path": path_prop() },
            "required": ["path"]
        }),
        "list_files" => json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Optional name substring filter" }
            }
        }),
        "search_files" => json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to find (case-insensitive)" },
                "file_pattern": { "type": "string", "description": "Optional file name substring filter" }
            },
            "required": ["query"]
        }),
        "read_file_lines" => json!({
            "type": "object",
            "properties": {
                "path": path_prop(),
                "start_line": { "type": "integer", "minimum": 1 },
                "end_line": { "type": "integer", "minimum": 1, "description": "Inclusive; defaults to end of file" }
            },
            "required": ["path", "start_line"]
        }),
        "save_knowledge" => json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } },
                "content": { "type": "string" },
                "scope": { "type": "string", "enum": ["global", "project"] }
            },
            "required": ["tags", "content"]
        }),
        "manage_tasks" => json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["add", "update", "complete", "remove", "list"] },
                "id": { "type": "string" },
                "title": { "type": "string" },
                "status": { "type": "string", "enum": ["pending", "in_progress", "done"] }
            },
            "required": ["action"]
        }),
        _ => json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Optional: limit the analysis to one file" }
            }
        }),
    }
}
