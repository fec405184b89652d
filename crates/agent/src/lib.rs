//! The tool-calling orchestrator: the heart of Codeweave.
//!
//! Each request runs a bounded **Call → Act → Observe** loop:
//!
//! 1. **Build context** (project files sized to the budget, ranked knowledge, task list)
//! 2. **Call the model**, whole or streamed, retrying transient failures
//! 3. **If tool calls**: repair their arguments, execute them, feed outputs back, go to 2
//! 4. **If text only**: return the accumulated text and proposed diffs
//!
//! The loop stops on a text-only reply, at the turn cap, or on cancellation.
//! Proposed diffs are never applied here; the host decides.

pub mod aggregate;
pub mod context;
pub mod error_classifier;
pub mod knowledge;
pub mod loop_runner;
pub mod prompt;
pub mod repair;
pub mod retry;
pub mod stream;
pub mod stream_event;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use aggregate::Aggregate;
pub use context::{BuiltContext, ContextBudget, ContextInput, ContextMode};
pub use knowledge::RankedEntry;
pub use loop_runner::{LoopState, MAX_TURNS, OrchestrationRequest, OrchestrationResult, Orchestrator, Outcome};
pub use prompt::Mode;
pub use repair::{RepairError, repair_arguments};
pub use retry::RetryPolicy;
pub use stream::StreamReconstructor;
pub use stream_event::AgentStreamEvent;
