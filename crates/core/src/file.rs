//! Project file snapshot and proposed diffs.
//!
//! The snapshot is supplied once per orchestration call and never mutated.
//! Every edit is expressed as a [`FileDiff`] proposal for an external consumer.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};
use uuid::Uuid;

/// A single file in the project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    pub language: String,
    pub content: String,
}

impl ProjectFile {
    /// Create a file, inferring its language from the extension.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let language = language_for(&name).to_string();
        Self {
            name,
            language,
            content: content.into(),
        }
    }

    /// Size in characters.
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Map a file name to a language label.
pub fn language_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("rs") => "rust",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => "javascript",
        Some("py") => "python",
        Some("go") => "go",
        Some("java") => "java",
        Some("kt") => "kotlin",
        Some("rb") => "ruby",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        Some("cs") => "csharp",
        Some("swift") => "swift",
        Some("html") | Some("htm") => "html",
        Some("css") | Some("scss") => "css",
        Some("json") => "json",
        Some("toml") => "toml",
        Some("yaml") | Some("yml") => "yaml",
        Some("md") => "markdown",
        Some("sh") => "shell",
        Some("sql") => "sql",
        _ => "plaintext",
    }
}

/// An immutable, ordered set of project files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSnapshot {
    files: Vec<ProjectFile>,
}

impl FileSnapshot {
    pub fn new(files: Vec<ProjectFile>) -> Self {
        Self { files }
    }

    /// Look up a file by exact name.
    pub fn get(&self, name: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    /// Aggregate size of every file, in characters.
    pub fn total_chars(&self) -> usize {
        self.files.iter().map(ProjectFile::size).sum()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Kind of change a diff proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for DiffOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffOp::Create => write!(f, "create"),
            DiffOp::Update => write!(f, "update"),
            DiffOp::Delete => write!(f, "delete"),
        }
    }
}

/// A proposed before/after content change awaiting external application.
///
/// `original_content` always equals the snapshot content at proposal time
/// (empty for a create).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDiff {
    pub id: String,
    pub file_name: String,
    pub original_content: String,
    pub new_content: String,
    pub op: DiffOp,
}

impl FileDiff {
    pub fn create(file_name: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            original_content: String::new(),
            new_content: new_content.into(),
            op: DiffOp::Create,
        }
    }

    pub fn update(original: &ProjectFile, new_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: original.name.clone(),
            original_content: original.content.clone(),
            new_content: new_content.into(),
            op: DiffOp::Update,
        }
    }

    pub fn delete(original: &ProjectFile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: original.name.clone(),
            original_content: original.content.clone(),
            new_content: String::new(),
            op: DiffOp::Delete,
        }
    }

    /// Count of (added, removed) lines in a line diff of the two contents.
    pub fn line_delta(&self) -> (usize, usize) {
        let diff = TextDiff::configure()
            .algorithm(Algorithm::Patience)
            .diff_lines(&self.original_content, &self.new_content);
        diff.iter_all_changes().fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
    }
}
