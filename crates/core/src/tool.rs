//! Tool invocation and execution result types.

use serde::{Deserialize, Serialize};

use crate::file::FileDiff;
use crate::message::MessageToolCall;

/// A complete, parsed request from the model to run one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call ID (matches the model's tool_call.id)
    pub id: String,

    /// Operation name
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,

    /// Zero-based turn in which the model issued this call
    pub turn: usize,
}

impl ToolInvocation {
    /// Wire form for replaying the call in conversation history.
    pub fn to_message_tool_call(&self) -> MessageToolCall {
        MessageToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.to_string(),
        }
    }
}

/// The outcome of one tool execution.
///
/// `output` is always present and is what the model sees next turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub output: String,

    #[serde(default = "default_true")]
    pub success: bool,

    /// Single proposed edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<FileDiff>,

    /// Batch of proposed edits
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<FileDiff>,

    /// Structured payload for non-file operations; never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl ToolExecutionResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            ..Default::default()
        }
    }

    pub fn with_diff(output: impl Into<String>, diff: FileDiff) -> Self {
        Self {
            output: output.into(),
            success: true,
            diff: Some(diff),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Every diff this result proposes, single first.
    pub fn all_diffs(&self) -> impl Iterator<Item = &FileDiff> {
        self.diff.iter().chain(self.diffs.iter())
    }
}
