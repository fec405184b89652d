//! Context budget management.
//!
//! Decides how much of the project the model sees up front. Small projects go
//! in whole. Over the size threshold the model gets either a precomputed
//! summary with a shortlist of relevant files (compressed), or a plain file
//! index with only the active file in full (lazy), and is told to fetch the
//! rest through the read/search tools.

use codeweave_config::ContextConfig;
use codeweave_core::file::{FileSnapshot, ProjectFile};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FETCH_INSTRUCTION: &str = "Only part of the project is shown above. Before editing or reasoning about \
any file whose contents you have not seen, call read_file, read_file_lines or search_files.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Full,
    Compressed,
    Lazy,
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMode::Full => write!(f, "full"),
            ContextMode::Compressed => write!(f, "compressed"),
            ContextMode::Lazy => write!(f, "lazy"),
        }
    }
}

/// What the budget manager needs to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    pub snapshot: &'a FileSnapshot,
    pub active_file: Option<&'a str>,
    pub request: &'a str,
    pub project_summary: Option<&'a str>,
    pub compression_enabled: bool,
    pub high_capacity: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltContext {
    pub text: String,
    pub mode: ContextMode,
}

impl BuiltContext {
    pub fn compression_used(&self) -> bool {
        self.mode != ContextMode::Full
    }
}

#[derive(Debug, Clone)]
pub struct ContextBudget {
    threshold: usize,
    high_capacity_multiplier: usize,
    relevant_file_limit: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

impl ContextBudget {
    pub fn new(threshold: usize, high_capacity_multiplier: usize, relevant_file_limit: usize) -> Self {
        Self {
            threshold,
            high_capacity_multiplier: high_capacity_multiplier.max(1),
            relevant_file_limit,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(
            config.compression_threshold,
            config.high_capacity_multiplier,
            config.relevant_file_limit,
        )
    }

    /// Effective threshold in chars.
    pub fn threshold(&self, high_capacity: bool) -> usize {
        if high_capacity {
            self.threshold.saturating_mul(self.high_capacity_multiplier)
        } else {
            self.threshold
        }
    }

    pub fn build(&self, input: &ContextInput<'_>) -> BuiltContext {
        let total = input.snapshot.total_chars();
        let threshold = self.threshold(input.high_capacity);

        let mode = if !input.compression_enabled || total <= threshold {
            ContextMode::Full
        } else if input.project_summary.is_some_and(|s| !s.trim().is_empty()) {
            ContextMode::Compressed
        } else {
            ContextMode::Lazy
        };
        debug!(total_chars = total, threshold, mode = %mode, "Context mode selected");

        let text = match mode {
            ContextMode::Full => full_context(input.snapshot),
            ContextMode::Compressed => self.compressed_context(input),
            ContextMode::Lazy => lazy_context(input),
        };
        BuiltContext { text, mode }
    }

    fn compressed_context(&self, input: &ContextInput<'_>) -> String {
        let relevant = relevant_files(input, self.relevant_file_limit);
        let mut out = String::from("## Project Summary\n");
        out.push_str(input.project_summary.unwrap_or_default().trim());
        out.push_str("\n\n## Relevant Files\n");
        for file in &relevant {
            out.push_str(&render_file(file));
        }

        let others: Vec<&str> = input
            .snapshot
            .files()
            .iter()
            .filter(|f| !relevant.iter().any(|r| r.name == f.name))
            .map(|f| f.name.as_str())
            .collect();
        if !others.is_empty() {
            out.push_str("\n## Other Files\n");
            for name in others {
                out.push_str(&format!("- {name}\n"));
            }
        }
        out.push('\n');
        out.push_str(FETCH_INSTRUCTION);
        out
    }
}

fn full_context(snapshot: &FileSnapshot) -> String {
    if snapshot.is_empty() {
        return "## Project Files\n(no files)\n".into();
    }
    let mut out = String::from("## Project Files\n");
    for file in snapshot.files() {
        out.push_str(&render_file(file));
    }
    out
}

fn lazy_context(input: &ContextInput<'_>) -> String {
    let mut out = String::from("## File Index\n");
    for file in input.snapshot.files() {
        out.push_str(&format!("- {} ({}, {} chars)\n", file.name, file.language, file.size()));
    }
    if let Some(active) = input.active_file.and_then(|name| input.snapshot.get(name)) {
        out.push_str("\n## Active File\n");
        out.push_str(&render_file(active));
    }
    out.push('\n');
    out.push_str(FETCH_INSTRUCTION);
    out
}

/// Active file first, then files the request names, up to `limit`.
fn relevant_files<'a>(input: &ContextInput<'a>, limit: usize) -> Vec<&'a ProjectFile> {
    let request = input.request.to_lowercase();
    let mut picked: Vec<&ProjectFile> = Vec::new();

    if let Some(active) = input.active_file.and_then(|name| input.snapshot.get(name)) {
        picked.push(active);
    }
    for file in input.snapshot.files() {
        if picked.len() >= limit {
            break;
        }
        if picked.iter().any(|p| p.name == file.name) {
            continue;
        }
        let name = file.name.to_lowercase();
        let base = name.rsplit('/').next().unwrap_or(&name);
        if request.contains(&name) || (base.len() >= 3 && request.contains(base)) {
            picked.push(file);
        }
    }
    picked.truncate(limit);
    picked
}

fn render_file(file: &ProjectFile) -> String {
    format!("### {}\n```{}\n{}\n```\n", file.name, file.language, file.content.trim_end())
}
