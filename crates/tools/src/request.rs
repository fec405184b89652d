//! Typed, validated argument records for every catalog operation.
//!
//! Raw model arguments are a loose JSON map; they are checked here once, at
//! the parse boundary, and everything downstream works with `ToolRequest`.

use codeweave_core::error::ToolError;
use codeweave_core::knowledge::KnowledgeScope;
use codeweave_core::task::TaskStatus;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::catalog;

/// One operation request, tagged by operation name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolRequest {
    CreateFile(WriteArgs),
    UpdateFile(WriteArgs),
    DeleteFile(PathArgs),
    ListFiles(ListArgs),
    SearchFiles(SearchArgs),
    ReadFile(PathArgs),
    ReadFileLines(LineRangeArgs),
    SaveKnowledge(KnowledgeArgs),
    ManageTasks(TaskArgs),
    AnalyzeDependencies(AnalysisArgs),
    ScanSecurity(AnalysisArgs),
    ReviewCode(AnalysisArgs),
    AnalyzePerformance(AnalysisArgs),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteArgs {
    #[serde(alias = "file_name", alias = "filename", alias = "file", alias = "file_path")]
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathArgs {
    #[serde(alias = "file_name", alias = "filename", alias = "file", alias = "file_path")]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListArgs {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArgs {
    #[serde(alias = "pattern", alias = "text", alias = "term")]
    pub query: String,
    #[serde(default)]
    pub file_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineRangeArgs {
    #[serde(alias = "file_name", alias = "filename", alias = "file", alias = "file_path")]
    pub path: String,
    #[serde(alias = "start", deserialize_with = "lenient_usize")]
    pub start_line: usize,
    #[serde(default, alias = "end", deserialize_with = "lenient_opt_usize")]
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeArgs {
    #[serde(alias = "tag", deserialize_with = "string_or_list")]
    pub tags: Vec<String>,
    #[serde(alias = "text", alias = "knowledge")]
    pub content: String,
    #[serde(default)]
    pub scope: KnowledgeScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Add,
    Update,
    Complete,
    Remove,
    List,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskArgs {
    pub action: TaskAction,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisArgs {
    #[serde(default, alias = "file_name", alias = "file")]
    pub path: Option<String>,
}

impl ToolRequest {
    /// Validate raw arguments for the named operation.
    ///
    /// Unknown names yield `ToolError::NotFound`; shape problems yield
    /// `ToolError::InvalidArguments` carrying serde's message (which names
    /// the missing field, if any).
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        let spec = catalog::spec(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = match arguments {
            Value::Null => json!({}),
            Value::Object(_) => arguments.clone(),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "{}: arguments must be an object, got {}",
                    spec.name,
                    type_name(other)
                )));
            }
        };

        let request: ToolRequest = serde_json::from_value(json!({ "tool": spec.name, "args": args }))
            .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", spec.name)))?;
        request.validate()?;
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::CreateFile(_) => "create_file",
            ToolRequest::UpdateFile(_) => "update_file",
            ToolRequest::DeleteFile(_) => "delete_file",
            ToolRequest::ListFiles(_) => "list_files",
            ToolRequest::SearchFiles(_) => "search_files",
            ToolRequest::ReadFile(_) => "read_file",
            ToolRequest::ReadFileLines(_) => "read_file_lines",
            ToolRequest::SaveKnowledge(_) => "save_knowledge",
            ToolRequest::ManageTasks(_) => "manage_tasks",
            ToolRequest::AnalyzeDependencies(_) => "analyze_dependencies",
            ToolRequest::ScanSecurity(_) => "scan_security",
            ToolRequest::ReviewCode(_) => "review_code",
            ToolRequest::AnalyzePerformance(_) => "analyze_performance",
        }
    }

    pub fn is_read_only(&self) -> bool {
        catalog::is_read_only(self.name())
    }

    fn validate(&self) -> Result<(), ToolError> {
        let invalid = |msg: &str| -> Result<(), ToolError> {
            Err(ToolError::InvalidArguments(format!("{}: {msg}", self.name())))
        };
        match self {
            ToolRequest::CreateFile(a) | ToolRequest::UpdateFile(a) if a.path.trim().is_empty() => {
                invalid("path must not be empty")
            }
            ToolRequest::DeleteFile(a) | ToolRequest::ReadFile(a) if a.path.trim().is_empty() => {
                invalid("path must not be empty")
            }
            ToolRequest::ReadFileLines(a) if a.path.trim().is_empty() => invalid("path must not be empty"),
            ToolRequest::SearchFiles(a) if a.query.trim().is_empty() => invalid("query must not be empty"),
            ToolRequest::SaveKnowledge(a) if a.content.trim().is_empty() => invalid("content must not be empty"),
            _ => Ok(()),
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accept `12`, `12.0`, or `"12"`. Repaired arguments often carry numbers as strings.
fn lenient_usize<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    let v = Value::deserialize(d)?;
    value_to_usize(&v).ok_or_else(|| serde::de::Error::custom(format!("expected a line number, got {v}")))
}

fn lenient_opt_usize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    let v = Value::deserialize(d)?;
    if v.is_null() {
        return Ok(None);
    }
    value_to_usize(&v)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a line number, got {v}")))
}

fn value_to_usize(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f.max(0.0) as u64))
            .map(|n| n as usize),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i.max(0) as usize),
        _ => None,
    }
}

/// Accept `["a", "b"]` or `"a, b"`.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect()),
        Value::String(s) => Ok(s
            .split([',', ' '])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(serde::de::Error::custom(format!("expected tags, got {other}"))),
    }
}
