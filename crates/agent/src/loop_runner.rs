//! The turn loop.
//!
//! One loop serves every entry point. Each turn calls the model (whole or
//! streamed, with retry), repairs and executes the tool calls it returns, and
//! feeds the outputs back in declaration order. The loop ends when the model
//! answers without tool calls, the turn cap is hit, the caller cancels, or
//! the model stays unreachable.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use codeweave_config::AppConfig;
use codeweave_core::diagnostic::{DetectedError, ErrorCategory, ErrorContext};
use codeweave_core::error::{Error, ProviderError};
use codeweave_core::event::{DomainEvent, EventBus};
use codeweave_core::file::{FileDiff, FileSnapshot};
use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use codeweave_core::message::{ConversationTurn, Message, MessageToolCall};
use codeweave_core::provider::{Provider, ProviderRequest};
use codeweave_core::task::TaskItem;
use codeweave_core::tool::{ToolExecutionResult, ToolInvocation};
use codeweave_security::ProtectedPathPolicy;
use codeweave_tools::ToolExecutor;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregate;
use crate::context::{BuiltContext, ContextBudget, ContextInput, ContextMode};
use crate::error_classifier;
use crate::knowledge::{self, DEFAULT_TOP_K, RankedEntry};
use crate::prompt::{self, Mode, PromptParts};
use crate::repair::repair_arguments;
use crate::retry::{CallError, RetryPolicy};
use crate::stream::StreamReconstructor;
use crate::stream_event::AgentStreamEvent;

/// Hard cap on model turns per orchestration.
pub const MAX_TURNS: usize = 5;

const DEFAULT_HISTORY_WINDOW: usize = 4;
const STREAM_BUFFER: usize = 64;

/// How an orchestration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The model answered without further tool calls.
    Completed,
    /// The turn cap was reached with tool calls still coming.
    TurnLimitReached,
    /// The cancellation token fired.
    Aborted,
    /// A model call failed after retries, after at least one completed turn.
    Failed,
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Aborted,
}

/// Per-call input.
#[derive(Debug, Clone)]
pub struct OrchestrationRequest {
    pub snapshot: Arc<FileSnapshot>,
    pub active_file: Option<String>,
    pub history: Vec<ConversationTurn>,
    pub request: String,
    pub mode: Mode,
    pub role: String,
    /// Entries to rank. `None` reads them from the knowledge store.
    pub knowledge: Option<Vec<KnowledgeEntry>>,
    pub tasks: Vec<TaskItem>,
    pub project_summary: Option<String>,
    pub compression_enabled: bool,
    pub high_capacity: bool,
    pub cancel: CancellationToken,
}

impl OrchestrationRequest {
    pub fn new(snapshot: Arc<FileSnapshot>, request: impl Into<String>) -> Self {
        Self {
            snapshot,
            active_file: None,
            history: Vec::new(),
            request: request.into(),
            mode: Mode::default(),
            role: String::new(),
            knowledge: None,
            tasks: Vec::new(),
            project_summary: None,
            compression_enabled: true,
            high_capacity: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_active_file(mut self, name: impl Into<String>) -> Self {
        self.active_file = Some(name.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_knowledge(mut self, entries: Vec<KnowledgeEntry>) -> Self {
        self.knowledge = Some(entries);
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskItem>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_project_summary(mut self, summary: impl Into<String>) -> Self {
        self.project_summary = Some(summary.into());
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    pub fn with_high_capacity(mut self, enabled: bool) -> Self {
        self.high_capacity = enabled;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Everything one orchestration produced, including partial work.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub text: String,
    pub diffs: Vec<FileDiff>,
    pub invocations: Vec<ToolInvocation>,
    pub compression_used: bool,
    pub context_mode: ContextMode,
    pub turns: usize,
    pub outcome: Outcome,
    /// Provider error message when `outcome` is [`Outcome::Failed`].
    pub failure: Option<String>,
    pub tasks: Vec<TaskItem>,
    pub errors: Vec<DetectedError>,
}

/// Text and tool calls of one model reply.
struct ModelReply {
    text: String,
    calls: Vec<MessageToolCall>,
}

/// What one turn's tool execution hands back to the loop.
struct TurnWork {
    invocations: Vec<ToolInvocation>,
    results: Vec<ToolExecutionResult>,
    replay: Vec<MessageToolCall>,
    tool_messages: Vec<Message>,
}

/// A model call as the model declared it, before execution.
enum Declared {
    /// Index into the turn's parsed invocations
    Parsed(usize),
    /// Arguments could not be repaired; the text goes back as tool output.
    Unparsed(String),
}

/// The turn-loop controller. Construct once, run many requests.
pub struct Orchestrator {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_turns: usize,
    history_window: usize,
    streaming: bool,
    tools_enabled: bool,
    budget: ContextBudget,
    retry: RetryPolicy,
    policy: ProtectedPathPolicy,
    search_cap: usize,
    auto_fix: bool,
    top_k: usize,
    knowledge: Arc<dyn KnowledgeStore>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(knowledge: Arc<dyn KnowledgeStore>, events: Arc<EventBus>) -> Self {
        Self {
            provider: None,
            model: String::new(),
            temperature: 0.2,
            max_tokens: None,
            max_turns: MAX_TURNS,
            history_window: DEFAULT_HISTORY_WINDOW,
            streaming: false,
            tools_enabled: true,
            budget: ContextBudget::default(),
            retry: RetryPolicy::default(),
            policy: ProtectedPathPolicy::default(),
            search_cap: 20,
            auto_fix: true,
            top_k: DEFAULT_TOP_K,
            knowledge,
            events,
        }
    }

    /// Build from loaded configuration. `provider` is `None` when no endpoint
    /// could be set up; requests then fail validation.
    pub fn from_config(
        config: &AppConfig,
        provider: Option<Arc<dyn Provider>>,
        knowledge: Arc<dyn KnowledgeStore>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut orchestrator = Self::new(knowledge, events)
            .with_model(config.provider.model.clone())
            .with_temperature(config.provider.temperature)
            .with_max_tokens(config.provider.max_tokens)
            .with_max_turns(config.orchestrator.max_turns)
            .with_history_window(config.orchestrator.history_window)
            .with_streaming(config.orchestrator.streaming)
            .with_tools_enabled(config.orchestrator.tools_enabled)
            .with_context_budget(ContextBudget::from_config(&config.context))
            .with_retry(RetryPolicy::from_config(&config.retry))
            .with_policy(ProtectedPathPolicy::new(&config.tools.extra_protected_patterns))
            .with_search_cap(config.tools.search_result_cap)
            .with_auto_fix(config.tools.auto_fix)
            .with_top_k(config.knowledge.top_k);
        orchestrator.provider = provider;
        orchestrator
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Lower the turn cap. Values above the configured maximum are accepted
    /// as given; zero is raised to one.
    pub fn with_max_turns(mut self, max: usize) -> Self {
        self.max_turns = max.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    pub fn with_context_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policy(mut self, policy: ProtectedPathPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_search_cap(mut self, cap: usize) -> Self {
        self.search_cap = cap;
        self
    }

    pub fn with_auto_fix(mut self, enabled: bool) -> Self {
        self.auto_fix = enabled;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Run one request to completion.
    pub async fn run(&self, request: OrchestrationRequest) -> Result<OrchestrationResult, Error> {
        self.drive(request, None).await
    }

    /// Run one request in the background, reporting progress as events.
    ///
    /// The stream always ends with exactly one `Done` or `Error` event.
    pub fn run_stream(self: &Arc<Self>, request: OrchestrationRequest) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let terminal = match this.drive(request, Some(&tx)).await {
                Ok(result) if result.outcome == Outcome::Failed => AgentStreamEvent::Error {
                    message: result.failure.unwrap_or_else(|| "model call failed".into()),
                },
                Ok(result) => AgentStreamEvent::Done {
                    text: result.text,
                    turns: result.turns,
                    outcome: result.outcome,
                },
                Err(e) => AgentStreamEvent::Error { message: e.to_string() },
            };
            let _ = tx.send(terminal).await;
        });
        rx
    }

    async fn drive(
        &self,
        req: OrchestrationRequest,
        sink: Option<&mpsc::Sender<AgentStreamEvent>>,
    ) -> Result<OrchestrationResult, Error> {
        let provider = self.validate(&req)?;
        let streaming = self.streaming || sink.is_some();
        info!(
            provider = provider.name(),
            model = %self.model,
            files = req.snapshot.len(),
            mode = %req.mode,
            streaming,
            tools = self.tools_enabled,
            "Starting orchestration"
        );

        let surfaced = self.surface_knowledge(&req).await;
        let context = self.budget.build(&ContextInput {
            snapshot: &req.snapshot,
            active_file: req.active_file.as_deref(),
            request: &req.request,
            project_summary: req.project_summary.as_deref(),
            compression_enabled: req.compression_enabled,
            high_capacity: req.high_capacity,
        });
        if context.compression_used() {
            emit(sink, AgentStreamEvent::Status {
                message: format!("Large project: using {} context", context.mode),
            })
            .await;
        }

        let system = prompt::system_prompt(&PromptParts {
            role: &req.role,
            mode: req.mode,
            context: &context,
            knowledge: &surfaced,
            tasks: &req.tasks,
            tools_enabled: self.tools_enabled,
            protected_patterns: self.policy.patterns(),
        });
        let mut messages = prompt::conversation(system, &req.history, self.history_window, &req.request);

        let executor = ToolExecutor::new(Arc::clone(&req.snapshot), Arc::clone(&self.knowledge))
            .with_policy(self.policy.clone())
            .with_search_cap(self.search_cap)
            .with_auto_fix(self.auto_fix);
        let tools = if self.tools_enabled { executor.definitions() } else { Vec::new() };

        let mut tasks = req.tasks.clone();
        let mut errors: Vec<DetectedError> = Vec::new();
        let mut aggregate = Aggregate::new(context.compression_used());
        let mut failure: Option<String> = None;
        let mut state = LoopState::AwaitingModel;
        let mut turn = 0;

        while state == LoopState::AwaitingModel {
            if turn >= self.max_turns {
                warn!(turns = turn, "Turn limit reached with tool calls pending");
                break;
            }
            debug!(turn, state = ?state, "Calling model");

            let provider_request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tools.clone(),
                stream: streaming,
            };
            let streamed = AtomicUsize::new(0);
            let called = self
                .retry
                .run(&req.cancel, &self.events, &mut errors, |attempt| {
                    if attempt > 1 {
                        debug!(turn, attempt, "Retrying model call");
                    }
                    self.call_model(
                        provider.as_ref(),
                        provider_request.clone(),
                        streaming,
                        sink,
                        &streamed,
                        turn,
                    )
                })
                .await;

            let reply = match called {
                Ok(reply) => reply,
                Err(CallError::Cancelled) => {
                    info!(turn, "Orchestration cancelled");
                    state = LoopState::Aborted;
                    break;
                }
                Err(CallError::Failed(err)) => {
                    if aggregate.turns() == 0 {
                        return Err(err.into());
                    }
                    warn!(turn, error = %err, "Model call failed, returning completed turns");
                    failure = Some(err.to_string());
                    state = LoopState::Done;
                    break;
                }
            };

            let calls = if self.tools_enabled { number_calls(reply.calls, turn) } else { Vec::new() };
            if calls.is_empty() {
                aggregate = aggregate.commit_turn(&reply.text, Vec::new(), &[]);
                self.publish_turn(turn, 0);
                state = LoopState::Done;
                break;
            }

            state = LoopState::ExecutingTools;
            debug!(turn, state = ?state, tool_calls = calls.len(), "Executing tool calls");
            let work = self
                .execute_turn(&executor, &calls, turn, &mut tasks, &mut errors, sink)
                .await;

            messages.push(Message::assistant_with_tools(reply.text.clone(), work.replay));
            messages.extend(work.tool_messages);
            aggregate = aggregate.commit_turn(&reply.text, work.invocations, &work.results);
            self.publish_turn(turn, calls.len());

            turn += 1;
            state = LoopState::AwaitingModel;
        }

        let outcome = match state {
            LoopState::Aborted => Outcome::Aborted,
            LoopState::Done if failure.is_some() => Outcome::Failed,
            LoopState::Done => Outcome::Completed,
            LoopState::AwaitingModel | LoopState::ExecutingTools => {
                aggregate = aggregate.with_note(&limit_note(self.max_turns));
                Outcome::TurnLimitReached
            }
        };

        info!(
            turns = aggregate.turns(),
            diffs = aggregate.diffs().len(),
            outcome = ?outcome,
            "Orchestration finished"
        );

        let compression_used = aggregate.compression_used();
        let turns = aggregate.turns();
        let (text, diffs, invocations) = aggregate.into_parts();
        Ok(OrchestrationResult {
            text,
            diffs,
            invocations,
            compression_used,
            context_mode: context.mode,
            turns,
            outcome,
            failure,
            tasks,
            errors,
        })
    }

    /// Fatal input checks, before any model call.
    fn validate(&self, req: &OrchestrationRequest) -> Result<Arc<dyn Provider>, Error> {
        if req.request.trim().is_empty() {
            return Err(Error::InvalidInput("request text is empty".into()));
        }
        let Some(provider) = &self.provider else {
            return Err(Error::Config {
                message: "no completion provider configured".into(),
            });
        };
        if self.model.trim().is_empty() {
            return Err(Error::Config {
                message: "no model configured".into(),
            });
        }
        Ok(Arc::clone(provider))
    }

    /// Rank knowledge for this request and count usage of what gets surfaced.
    async fn surface_knowledge(&self, req: &OrchestrationRequest) -> Vec<RankedEntry> {
        let entries = match &req.knowledge {
            Some(entries) => entries.clone(),
            None => match self.knowledge.all().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(store = self.knowledge.name(), "Knowledge read failed: {e}");
                    Vec::new()
                }
            },
        };

        let ranked = knowledge::rank(&entries, &req.request, self.top_k);
        if ranked.is_empty() {
            return ranked;
        }

        let ids: Vec<String> = ranked.iter().map(|r| r.entry.id.clone()).collect();
        debug!(count = ids.len(), "Surfacing knowledge entries");
        if let Err(e) = self.knowledge.record_usage(&ids).await {
            warn!(store = self.knowledge.name(), "Recording knowledge usage failed: {e}");
        }
        self.events.publish(DomainEvent::KnowledgeSurfaced {
            entry_ids: ids,
            timestamp: Utc::now(),
        });
        ranked
    }

    async fn call_model(
        &self,
        provider: &dyn Provider,
        request: ProviderRequest,
        streaming: bool,
        sink: Option<&mpsc::Sender<AgentStreamEvent>>,
        streamed: &AtomicUsize,
        turn: usize,
    ) -> Result<ModelReply, ProviderError> {
        if !streaming {
            let response = provider.complete(request).await?;
            if let Some(usage) = &response.usage {
                debug!(turn, tokens = usage.total_tokens, "Model response received");
            }
            return Ok(ModelReply {
                text: response.message.content,
                calls: response.message.tool_calls,
            });
        }

        // `streamed` counts characters of this turn already sent to the sink.
        // A retried attempt replays the response from the start, so only the
        // part past that count is sent again.
        let mut rx = provider.stream(request).await?;
        let mut text = String::new();
        let mut seen = 0;
        let mut reconstructor = StreamReconstructor::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                text.push_str(&content);
                let len = content.chars().count();
                let sent = streamed.load(Ordering::Relaxed);
                if seen + len > sent {
                    let fresh: String = content.chars().skip(sent.saturating_sub(seen)).collect();
                    streamed.store(seen + len, Ordering::Relaxed);
                    emit(sink, AgentStreamEvent::Chunk { content: fresh }).await;
                }
                seen += len;
            }
            for fragment in &chunk.tool_calls {
                if let Some(hint) = reconstructor.push(fragment) {
                    emit(sink, AgentStreamEvent::Status { message: hint }).await;
                }
            }
            if chunk.done {
                break;
            }
        }
        Ok(ModelReply {
            text,
            calls: reconstructor.finish(turn),
        })
    }

    /// Repair, execute, and record one turn's calls. Tool failures never
    /// escape; they become the output the model sees next turn.
    async fn execute_turn(
        &self,
        executor: &ToolExecutor,
        calls: &[MessageToolCall],
        turn: usize,
        tasks: &mut Vec<TaskItem>,
        errors: &mut Vec<DetectedError>,
        sink: Option<&mpsc::Sender<AgentStreamEvent>>,
    ) -> TurnWork {
        let mut invocations = Vec::new();
        let mut declared = Vec::with_capacity(calls.len());
        for call in calls {
            match repair_arguments(&call.arguments) {
                Ok(arguments) => {
                    declared.push(Declared::Parsed(invocations.len()));
                    invocations.push(ToolInvocation {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments,
                        turn,
                    });
                }
                Err(e) => {
                    warn!(tool = %call.name, "{e}");
                    let message = e.to_string();
                    self.record_error(
                        errors,
                        DetectedError::new(
                            ErrorCategory::Syntax,
                            error_classifier::severity(ErrorCategory::Syntax, &message),
                            message,
                            ErrorContext {
                                tool_name: Some(call.name.clone()),
                                attempt: 1,
                            },
                        ),
                    );
                    declared.push(Declared::Unparsed(format!(
                        "Error: {e}. Send the call again with a valid JSON object as arguments."
                    )));
                }
            }
        }

        for inv in &invocations {
            emit(sink, AgentStreamEvent::ToolCall {
                id: inv.id.clone(),
                name: inv.name.clone(),
                input: inv.arguments.clone(),
            })
            .await;
        }

        let outcomes = executor.execute_all(&invocations, tasks).await;

        for outcome in &outcomes {
            let name = &outcome.invocation.name;
            self.events.publish(DomainEvent::ToolExecuted {
                tool_name: name.clone(),
                success: outcome.result.success,
                duration_ms: outcome.duration_ms,
                timestamp: Utc::now(),
            });
            for (i, err) in outcome.errors.iter().enumerate() {
                let mut detected = error_classifier::detect_tool_error(err, name, i as u32 + 1);
                if i == 0 && outcome.fix_note.is_some() {
                    detected.resolve();
                }
                self.record_error(errors, detected);
            }
            for diff in outcome.result.all_diffs() {
                emit(sink, AgentStreamEvent::Diff { diff: diff.clone() }).await;
            }
        }

        let mut replay = Vec::with_capacity(calls.len());
        let mut tool_messages = Vec::with_capacity(calls.len());
        for (call, slot) in calls.iter().zip(&declared) {
            match slot {
                Declared::Parsed(i) => {
                    replay.push(invocations[*i].to_message_tool_call());
                    tool_messages.push(Message::tool_result(&call.id, outcomes[*i].result.output.clone()));
                }
                Declared::Unparsed(text) => {
                    replay.push(call.clone());
                    tool_messages.push(Message::tool_result(&call.id, text.clone()));
                }
            }
        }

        TurnWork {
            invocations,
            results: outcomes.into_iter().map(|o| o.result).collect(),
            replay,
            tool_messages,
        }
    }

    fn record_error(&self, errors: &mut Vec<DetectedError>, error: DetectedError) {
        self.events.publish(DomainEvent::ErrorDetected {
            category: error.category,
            message: error.message.clone(),
            timestamp: Utc::now(),
        });
        errors.push(error);
    }

    fn publish_turn(&self, turn: usize, tool_calls: usize) {
        debug!(turn, tool_calls, "Turn completed");
        self.events.publish(DomainEvent::TurnCompleted {
            turn,
            tool_calls,
            timestamp: Utc::now(),
        });
    }
}

/// Drop nameless calls and give every call an id.
fn number_calls(calls: Vec<MessageToolCall>, turn: usize) -> Vec<MessageToolCall> {
    calls
        .into_iter()
        .enumerate()
        .filter(|(_, call)| !call.name.trim().is_empty())
        .map(|(index, mut call)| {
            if call.id.trim().is_empty() {
                call.id = format!("call_{turn}_{index}");
            }
            call
        })
        .collect()
}

fn limit_note(max_turns: usize) -> String {
    format!("[Stopped after reaching the limit of {max_turns} turns. Ask me to continue if more work is needed.]")
}

async fn emit(sink: Option<&mpsc::Sender<AgentStreamEvent>>, event: AgentStreamEvent) {
    if let Some(tx) = sink {
        // A dropped receiver only means nobody is watching
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response};
    use codeweave_core::file::ProjectFile;
    use codeweave_core::message::Role;
    use codeweave_memory::InMemoryKnowledgeStore;
    use serde_json::json;

    fn snapshot() -> Arc<FileSnapshot> {
        Arc::new(FileSnapshot::new(vec![
            ProjectFile::new("src/app.ts", "import { login } from './login';\nlogin();\n"),
            ProjectFile::new("src/login.ts", "export function login() {}\n"),
        ]))
    }

    fn orchestrator(provider: Arc<SequentialMockProvider>) -> Orchestrator {
        Orchestrator::new(Arc::new(InMemoryKnowledgeStore::new()), Arc::new(EventBus::default()))
            .with_provider(provider)
            .with_model("mock-model")
    }

    #[tokio::test]
    async fn text_only_reply_completes_in_one_turn() {
        let provider = Arc::new(SequentialMockProvider::single_text("Looks fine."));
        let result = orchestrator(provider.clone())
            .run(OrchestrationRequest::new(snapshot(), "review login"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.turns, 1);
        assert_eq!(result.text, "Looks fine.");
        assert_eq!(result.context_mode, ContextMode::Full);
        assert_eq!(provider.call_count().await, 1);
    }

    #[tokio::test]
    async fn tool_outputs_fed_back_before_next_turn() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("read_file", json!({"path": "src/login.ts"}))],
            "Reading.",
            "It exports login.",
        ));
        let result = orchestrator(provider.clone())
            .run(OrchestrationRequest::new(snapshot(), "what does login do"))
            .await
            .unwrap();
        assert_eq!(result.turns, 2);
        assert_eq!(result.invocations.len(), 1);
        assert_eq!(result.text, "Reading.\n\nIt exports login.");

        let requests = provider.requests().await;
        let second = &requests[1].messages;
        let assistant = &second[second.len() - 2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.tool_calls.len(), 1);
        let tool = second.last().unwrap();
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_read_file"));
        assert!(tool.content.contains("export function login"));
    }

    #[tokio::test]
    async fn validation_errors_before_any_model_call() {
        let provider = Arc::new(SequentialMockProvider::single_text("x"));
        let orch = orchestrator(provider.clone());
        let err = orch.run(OrchestrationRequest::new(snapshot(), "   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let no_model = orchestrator(provider.clone()).with_model("");
        let err = no_model.run(OrchestrationRequest::new(snapshot(), "hi")).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let no_provider = Orchestrator::new(Arc::new(InMemoryKnowledgeStore::new()), Arc::new(EventBus::default()))
            .with_model("m");
        let err = no_provider.run(OrchestrationRequest::new(snapshot(), "hi")).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn tools_disabled_ignores_calls_and_sends_no_catalog() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("delete_file", json!({"path": "src/app.ts"}))],
            "Answer without tools.",
        )]));
        let result = orchestrator(provider.clone())
            .with_tools_enabled(false)
            .run(OrchestrationRequest::new(snapshot(), "explain app"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Completed);
        assert!(result.diffs.is_empty());
        assert!(provider.requests().await[0].tools.is_empty());
    }

    #[tokio::test]
    async fn unrepairable_arguments_become_tool_output() {
        let mut bad = make_tool_call("read_file", json!({}));
        bad.arguments = "<<not json at all>>".into();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![bad], ""),
            make_text_response("Sorry."),
        ]));
        let result = orchestrator(provider.clone())
            .run(OrchestrationRequest::new(snapshot(), "read it"))
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Completed);
        assert!(result.invocations.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Syntax);

        let requests = provider.requests().await;
        let tool = requests[1].messages.last().unwrap();
        assert!(tool.content.contains("Could not parse tool arguments"));
    }

    #[test]
    fn nameless_calls_dropped_and_ids_filled() {
        let calls = vec![
            MessageToolCall { id: String::new(), name: "list_files".into(), arguments: "{}".into() },
            MessageToolCall { id: "x".into(), name: " ".into(), arguments: "{}".into() },
            MessageToolCall { id: "keep".into(), name: "read_file".into(), arguments: "{}".into() },
        ];
        let numbered = number_calls(calls, 2);
        assert_eq!(numbered.len(), 2);
        assert_eq!(numbered[0].id, "call_2_0");
        assert_eq!(numbered[1].id, "keep");
    }
}
