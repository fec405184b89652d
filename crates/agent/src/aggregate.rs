//! Per-call result accumulation.
//!
//! The loop owns one [`Aggregate`] and replaces it with the value returned by
//! [`Aggregate::commit_turn`] once a turn has fully completed. A turn that is
//! interrupted never reaches the commit, so it leaves no trace.

use codeweave_core::file::FileDiff;
use codeweave_core::tool::{ToolExecutionResult, ToolInvocation};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    segments: Vec<String>,
    diffs: Vec<FileDiff>,
    invocations: Vec<ToolInvocation>,
    compression_used: bool,
    turns: usize,
}

impl Aggregate {
    pub fn new(compression_used: bool) -> Self {
        Self {
            compression_used,
            ..Default::default()
        }
    }

    /// Fold one completed turn in: its text, the invocations it issued and
    /// their results, in declaration order.
    pub fn commit_turn(mut self, text: &str, invocations: Vec<ToolInvocation>, results: &[ToolExecutionResult]) -> Self {
        self.push_segment(text);
        self.invocations.extend(invocations);
        self.diffs.extend(results.iter().flat_map(|r| r.all_diffs().cloned()));
        self.turns += 1;
        self
    }

    /// Append text that does not belong to a model turn.
    pub fn with_note(mut self, note: &str) -> Self {
        self.push_segment(note);
        self
    }

    fn push_segment(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.segments.push(text.to_string());
        }
    }

    pub fn text(&self) -> String {
        self.segments.join("\n\n")
    }

    pub fn diffs(&self) -> &[FileDiff] {
        &self.diffs
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    pub fn compression_used(&self) -> bool {
        self.compression_used
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn into_parts(self) -> (String, Vec<FileDiff>, Vec<ToolInvocation>) {
        let text = self.text();
        (text, self.diffs, self.invocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(name: &str, turn: usize) -> ToolInvocation {
        ToolInvocation {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: json!({}),
            turn,
        }
    }

    #[test]
    fn commits_accumulate_in_order() {
        let mut batch = ToolExecutionResult::with_diff("ok", FileDiff::create("a.ts", "1"));
        batch.diffs.push(FileDiff::create("b.ts", "2"));

        let agg = Aggregate::new(true)
            .commit_turn("Looking at the files.", vec![invocation("read_file", 0)], &[ToolExecutionResult::text("x")])
            .commit_turn("", vec![invocation("create_file", 1)], &[batch])
            .commit_turn("Done.", vec![], &[]);

        assert_eq!(agg.turns(), 3);
        assert!(agg.compression_used());
        assert_eq!(agg.text(), "Looking at the files.\n\nDone.");
        let names: Vec<_> = agg.diffs().iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.ts", "b.ts"]);
        assert_eq!(agg.invocations().len(), 2);
        assert_eq!(agg.invocations()[1].turn, 1);
    }

    #[test]
    fn failed_results_contribute_no_diffs() {
        let agg = Aggregate::new(false).commit_turn(
            "",
            vec![invocation("update_file", 0)],
            &[ToolExecutionResult::failure("Error: blocked")],
        );
        assert!(agg.diffs().is_empty());
        assert_eq!(agg.turns(), 1);
    }

    #[test]
    fn note_does_not_count_as_turn() {
        let agg = Aggregate::new(false).commit_turn("a", vec![], &[]).with_note("[stopped]");
        assert_eq!(agg.turns(), 1);
        assert_eq!(agg.text(), "a\n\n[stopped]");
    }
}
