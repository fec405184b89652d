//! Task-list entries managed through the `manage_tasks` operation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl TaskItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
        }
    }
}

/// Render a task list as checklist lines.
pub fn render_tasks(tasks: &[TaskItem]) -> String {
    tasks
        .iter()
        .map(|t| {
            let mark = match t.status {
                TaskStatus::Done => "x",
                TaskStatus::InProgress => "~",
                TaskStatus::Pending => " ",
            };
            format!("- [{mark}] {} ({})", t.title, t.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
