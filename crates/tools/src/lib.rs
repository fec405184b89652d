//! Built-in tools for Codeweave.
//!
//! Every tool works against an immutable [`FileSnapshot`](codeweave_core::file::FileSnapshot):
//! mutations are proposed as diffs, never written. The [`ToolExecutor`] parses
//! the model's arguments, schedules read-only calls concurrently, and retries
//! a failed call once with auto-fixed arguments.

pub mod autofix;
pub mod catalog;
pub mod diagnostics;
pub mod executor;
pub mod file_read;
pub mod file_write;
pub mod knowledge;
pub mod request;
pub mod tasks;

pub use catalog::{CATALOG, ToolSpec, canonical_name, is_read_only};
pub use executor::{Batch, ToolExecutor, ToolOutcome, plan_batches};
pub use request::ToolRequest;
