//! Mutating file operations. Each one proposes a `FileDiff`; nothing is applied.

use codeweave_core::error::ToolError;
use codeweave_core::file::{FileDiff, FileSnapshot};
use codeweave_core::tool::ToolExecutionResult;
use codeweave_security::{ProtectedPathError, ProtectedPathPolicy};

use crate::request::{PathArgs, WriteArgs};

fn guard(policy: &ProtectedPathPolicy, tool_name: &str, path: &str) -> Result<(), ToolError> {
    match policy.check(path) {
        Ok(()) => Ok(()),
        Err(ProtectedPathError::Protected { .. }) => Err(ToolError::Blocked { path: path.into() }),
        Err(e) => Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        }),
    }
}

/// Create a file. An existing file is overwritten in full.
pub fn create_file(
    snapshot: &FileSnapshot,
    policy: &ProtectedPathPolicy,
    args: &WriteArgs,
) -> Result<ToolExecutionResult, ToolError> {
    guard(policy, "create_file", &args.path)?;

    let lines = args.content.lines().count();
    match snapshot.get(&args.path) {
        Some(existing) => Ok(ToolExecutionResult::with_diff(
            format!("'{}' already existed; proposed full overwrite ({lines} lines)", args.path),
            FileDiff::update(existing, args.content.clone()),
        )),
        None => Ok(ToolExecutionResult::with_diff(
            format!("Proposed new file '{}' ({lines} lines)", args.path),
            FileDiff::create(args.path.clone(), args.content.clone()),
        )),
    }
}

/// Replace an existing file's entire content.
pub fn update_file(
    snapshot: &FileSnapshot,
    policy: &ProtectedPathPolicy,
    args: &WriteArgs,
) -> Result<ToolExecutionResult, ToolError> {
    guard(policy, "update_file", &args.path)?;

    let existing = snapshot.get(&args.path).ok_or_else(|| ToolError::FileNotFound {
        file_name: args.path.clone(),
    })?;

    if existing.content == args.content {
        return Ok(ToolExecutionResult::text(format!(
            "'{}' is unchanged; no diff proposed",
            args.path
        )));
    }

    let diff = FileDiff::update(existing, args.content.clone());
    let (added, removed) = diff.line_delta();
    Ok(ToolExecutionResult::with_diff(
        format!("Proposed update to '{}' (+{added} -{removed} lines)", args.path),
        diff,
    ))
}

pub fn delete_file(
    snapshot: &FileSnapshot,
    policy: &ProtectedPathPolicy,
    args: &PathArgs,
) -> Result<ToolExecutionResult, ToolError> {
    guard(policy, "delete_file", &args.path)?;

    let existing = snapshot.get(&args.path).ok_or_else(|| ToolError::FileNotFound {
        file_name: args.path.clone(),
    })?;

    Ok(ToolExecutionResult::with_diff(
        format!("Proposed deletion of '{}'", args.path),
        FileDiff::delete(existing),
    ))
}
