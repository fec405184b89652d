//! # Codeweave Core
//!
//! Domain types, traits, and error definitions for the Codeweave tool-calling
//! orchestrator. Every collaborator the turn loop talks to (the completion
//! service, the knowledge store, event subscribers) is defined as a trait or
//! value type here; implementations live in their respective crates.

pub mod error;
pub mod message;
pub mod provider;
pub mod file;
pub mod tool;
pub mod knowledge;
pub mod task;
pub mod diagnostic;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::Error;
pub use message::{ConversationTurn, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallFragment, ToolDefinition};
pub use file::{DiffOp, FileDiff, FileSnapshot, ProjectFile};
pub use tool::{ToolExecutionResult, ToolInvocation};
pub use knowledge::{KnowledgeEntry, KnowledgeScope, KnowledgeStore};
pub use task::{TaskItem, TaskStatus};
pub use diagnostic::{DetectedError, ErrorCategory, ErrorContext, Severity};
pub use event::{DomainEvent, EventBus};
