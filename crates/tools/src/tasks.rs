//! `manage_tasks`: edits the per-call task list passed in by the executor.

use codeweave_core::error::ToolError;
use codeweave_core::task::{TaskItem, TaskStatus, render_tasks};
use codeweave_core::tool::ToolExecutionResult;
use serde_json::json;

use crate::request::{TaskAction, TaskArgs};

pub fn manage_tasks(tasks: &mut Vec<TaskItem>, args: &TaskArgs) -> Result<ToolExecutionResult, ToolError> {
    let summary = match args.action {
        TaskAction::Add => {
            let title = required(args.title.as_deref(), "title")?;
            let id = args.id.clone().filter(|id| !id.trim().is_empty()).unwrap_or_else(|| next_id(tasks));
            if tasks.iter().any(|t| t.id == id) {
                return Err(invalid(format!("task '{id}' already exists")));
            }
            let mut item = TaskItem::new(id.clone(), title);
            if let Some(status) = args.status {
                item.status = status;
            }
            tasks.push(item);
            format!("Added task {id}")
        }
        TaskAction::Update => {
            let task = find(tasks, args.id.as_deref())?;
            if let Some(title) = args.title.as_deref().filter(|t| !t.trim().is_empty()) {
                task.title = title.to_string();
            }
            if let Some(status) = args.status {
                task.status = status;
            }
            format!("Updated task {}", task.id)
        }
        TaskAction::Complete => {
            let task = find(tasks, args.id.as_deref())?;
            task.status = TaskStatus::Done;
            format!("Completed task {}", task.id)
        }
        TaskAction::Remove => {
            let id = required(args.id.as_deref(), "id")?;
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                return Err(invalid(format!("no task with id '{id}'")));
            }
            format!("Removed task {id}")
        }
        TaskAction::List => format!("{} task(s)", tasks.len()),
    };

    let listing = if tasks.is_empty() { "(no tasks)".to_string() } else { render_tasks(tasks) };
    Ok(ToolExecutionResult::text(format!("{summary}\n{listing}")).with_metadata(json!({ "tasks": tasks })))
}

fn invalid(reason: String) -> ToolError {
    ToolError::InvalidArguments(format!("manage_tasks: {reason}"))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ToolError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(format!("missing field `{field}`")))
}

fn find<'a>(tasks: &'a mut [TaskItem], id: Option<&str>) -> Result<&'a mut TaskItem, ToolError> {
    let id = required(id, "id")?;
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| invalid(format!("no task with id '{id}'")))
}

fn next_id(tasks: &[TaskItem]) -> String {
    let mut n = tasks.len() + 1;
    while tasks.iter().any(|t| t.id == format!("task-{n}")) {
        n += 1;
    }
    format!("task-{n}")
}
