//! Orchestrator-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level chunks and tool results into the
//! events a host forwards to its UI. Every stream ends with exactly one
//! terminal event, `done` or `error`.

use codeweave_core::file::FileDiff;
use serde::{Deserialize, Serialize};

use crate::loop_runner::Outcome;

/// Events emitted while an orchestration runs in streaming mode.
///
/// - `chunk`: partial text from the model
/// - `tool_call`: a reconstructed invocation is about to run
/// - `diff`: a tool proposed a file change
/// - `status`: progress hint (tool being prepared, retry in progress)
/// - `done`: terminal, carries the full accumulated text
/// - `error`: terminal, nothing more follows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Chunk { content: String },

    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    Diff { diff: FileDiff },

    Status { message: String },

    Done { text: String, turns: usize, outcome: Outcome },

    Error { message: String },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::Diff { .. } => "diff",
            Self::Status { .. } => "status",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk { content: "Hello".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = AgentStreamEvent::Done {
            text: "all good".into(),
            turns: 2,
            outcome: Outcome::TurnLimitReached,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""turns":2"#));
        assert!(json.contains(r#""outcome":"turn_limit_reached""#));
    }

    #[test]
    fn event_serialization_diff() {
        let event = AgentStreamEvent::Diff {
            diff: FileDiff::create("src/new.ts", "export {}"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"diff""#));
        assert!(json.contains(r#""file_name":"src/new.ts""#));
    }

    #[test]
    fn terminal_events() {
        assert!(AgentStreamEvent::Error { message: "x".into() }.is_terminal());
        assert!(!AgentStreamEvent::Status { message: "x".into() }.is_terminal());
        assert_eq!(AgentStreamEvent::Status { message: "x".into() }.event_type(), "status");
        assert_eq!(
            AgentStreamEvent::ToolCall {
                id: "a".into(),
                name: "b".into(),
                input: serde_json::Value::Null
            }
            .event_type(),
            "tool_call"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"chunk","content":"hi"}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Chunk { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
