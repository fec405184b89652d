//! Tool executor: dispatches one turn's invocations against the snapshot.
//!
//! Consecutive read-only calls form a batch that runs concurrently; every
//! mutating call runs alone, in declaration order. Outcomes always come back
//! in declaration order regardless of how they were scheduled.

use std::sync::Arc;
use std::time::Instant;

use codeweave_core::error::ToolError;
use codeweave_core::file::FileSnapshot;
use codeweave_core::knowledge::KnowledgeStore;
use codeweave_core::provider::ToolDefinition;
use codeweave_core::task::TaskItem;
use codeweave_core::tool::{ToolExecutionResult, ToolInvocation};
use codeweave_security::ProtectedPathPolicy;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::request::ToolRequest;
use crate::{autofix, catalog, diagnostics, file_read, file_write, knowledge, tasks};

const DEFAULT_SEARCH_CAP: usize = 20;

/// The full record of one executed invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub invocation: ToolInvocation,
    pub result: ToolExecutionResult,
    /// Errors raised, in order: the original failure, then the retry's failure if any.
    pub errors: Vec<ToolError>,
    /// Set when an auto-fixed re-invocation succeeded.
    pub fix_note: Option<String>,
    pub duration_ms: u64,
}

/// Scheduling unit within one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Indices of consecutive read-only invocations
    Concurrent(Vec<usize>),
    /// Index of one mutating invocation
    Sequential(usize),
}

/// Group invocations: runs of read-only calls become one concurrent batch,
/// each mutating call is its own sequential step.
pub fn plan_batches(invocations: &[ToolInvocation]) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut pending: Vec<usize> = Vec::new();
    for (i, inv) in invocations.iter().enumerate() {
        if catalog::is_read_only(&inv.name) {
            pending.push(i);
        } else {
            if !pending.is_empty() {
                batches.push(Batch::Concurrent(std::mem::take(&mut pending)));
            }
            batches.push(Batch::Sequential(i));
        }
    }
    if !pending.is_empty() {
        batches.push(Batch::Concurrent(pending));
    }
    batches
}

pub struct ToolExecutor {
    snapshot: Arc<FileSnapshot>,
    knowledge: Arc<dyn KnowledgeStore>,
    policy: ProtectedPathPolicy,
    search_cap: usize,
    auto_fix: bool,
}

impl ToolExecutor {
    pub fn new(snapshot: Arc<FileSnapshot>, knowledge: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            snapshot,
            knowledge,
            policy: ProtectedPathPolicy::default(),
            search_cap: DEFAULT_SEARCH_CAP,
            auto_fix: true,
        }
    }

    pub fn with_policy(mut self, policy: ProtectedPathPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_search_cap(mut self, cap: usize) -> Self {
        self.search_cap = cap.max(1);
        self
    }

    pub fn with_auto_fix(mut self, enabled: bool) -> Self {
        self.auto_fix = enabled;
        self
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        &self.snapshot
    }

    pub fn policy(&self) -> &ProtectedPathPolicy {
        &self.policy
    }

    /// Definitions sent to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        catalog::definitions()
    }

    /// Execute one turn's invocations. `task_list` is edited in place by
    /// `manage_tasks`, which always runs sequentially.
    pub async fn execute_all(&self, invocations: &[ToolInvocation], task_list: &mut Vec<TaskItem>) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(invocations.len());
        for batch in plan_batches(invocations) {
            match batch {
                Batch::Concurrent(indices) => {
                    debug!(count = indices.len(), "Running read-only batch concurrently");
                    let results = join_all(indices.iter().map(|&i| self.execute(&invocations[i], None))).await;
                    outcomes.extend(results);
                }
                Batch::Sequential(i) => {
                    outcomes.push(self.execute(&invocations[i], Some(&mut *task_list)).await);
                }
            }
        }
        outcomes
    }

    /// Execute one invocation, with at most one auto-fixed re-invocation.
    pub async fn execute(&self, invocation: &ToolInvocation, mut task_list: Option<&mut Vec<TaskItem>>) -> ToolOutcome {
        let started = Instant::now();
        let first = self
            .run(&invocation.name, &invocation.arguments, task_list.as_deref_mut())
            .await;

        let (result, errors, fix_note) = match first {
            Ok(result) => (result, Vec::new(), None),
            Err(first_err) => {
                let fix = if self.auto_fix {
                    autofix::suggest(&invocation.name, &invocation.arguments, &first_err, &self.snapshot)
                } else {
                    None
                };
                match fix {
                    None => {
                        warn!(tool = %invocation.name, error = %first_err, "Tool call failed");
                        (ToolExecutionResult::failure(self.failure_text(&first_err)), vec![first_err], None)
                    }
                    Some(fix) => {
                        info!(tool = %invocation.name, fix = %fix.note, "Retrying tool call with corrected arguments");
                        match self.run(&invocation.name, &fix.arguments, task_list.as_deref_mut()).await {
                            Ok(mut result) => {
                                result.output = format!("[auto-fixed: {}]\n{}", fix.note, result.output);
                                (result, vec![first_err], Some(fix.note))
                            }
                            Err(second_err) => {
                                warn!(
                                    tool = %invocation.name,
                                    error = %first_err,
                                    retry_error = %second_err,
                                    "Tool call failed after auto-fix"
                                );
                                let output = format!(
                                    "{}\nAuto-fix attempted ({}) but failed: {}",
                                    self.failure_text(&first_err),
                                    fix.note,
                                    self.failure_text(&second_err)
                                );
                                (ToolExecutionResult::failure(output), vec![first_err, second_err], None)
                            }
                        }
                    }
                }
            }
        };

        ToolOutcome {
            invocation: invocation.clone(),
            result,
            errors,
            fix_note,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        task_list: Option<&mut Vec<TaskItem>>,
    ) -> Result<ToolExecutionResult, ToolError> {
        let snapshot = self.snapshot.as_ref();
        match ToolRequest::parse(name, arguments)? {
            ToolRequest::CreateFile(a) => file_write::create_file(snapshot, &self.policy, &a),
            ToolRequest::UpdateFile(a) => file_write::update_file(snapshot, &self.policy, &a),
            ToolRequest::DeleteFile(a) => file_write::delete_file(snapshot, &self.policy, &a),
            ToolRequest::ListFiles(a) => Ok(file_read::list_files(snapshot, &a)),
            ToolRequest::SearchFiles(a) => Ok(file_read::search_files(snapshot, &a, self.search_cap)),
            ToolRequest::ReadFile(a) => file_read::read_file(snapshot, &a),
            ToolRequest::ReadFileLines(a) => file_read::read_file_lines(snapshot, &a),
            ToolRequest::SaveKnowledge(a) => knowledge::save_knowledge(self.knowledge.as_ref(), &a).await,
            ToolRequest::ManageTasks(a) => match task_list {
                Some(list) => tasks::manage_tasks(list, &a),
                None => Err(ToolError::ExecutionFailed {
                    tool_name: "manage_tasks".into(),
                    reason: "task list is only available to sequential calls".into(),
                }),
            },
            ToolRequest::AnalyzeDependencies(a) => diagnostics::analyze_dependencies(snapshot, &a),
            ToolRequest::ScanSecurity(a) => diagnostics::scan_security(snapshot, &a),
            ToolRequest::ReviewCode(a) => diagnostics::review_code(snapshot, &a),
            ToolRequest::AnalyzePerformance(a) => diagnostics::analyze_performance(snapshot, &a),
        }
    }

    /// Model-facing error text. Lookup failures list what does exist so the
    /// model can correct itself next turn.
    fn failure_text(&self, err: &ToolError) -> String {
        match err {
            ToolError::FileNotFound { .. } => {
                let names = self.snapshot.names();
                if names.is_empty() {
                    format!("Error: {err}. The project has no files.")
                } else {
                    format!("Error: {err}. Valid file names: {}", names.join(", "))
                }
            }
            ToolError::NotFound(_) => {
                format!("Error: {err}. Available tools: {}", catalog::names().join(", "))
            }
            ToolError::Blocked { .. } => format!("Error: {err}. The action was blocked; no change was proposed."),
            _ => format!("Error: {err}"),
        }
    }
}
