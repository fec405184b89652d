//! Streaming runs: event sequence, terminal events, chunk-boundary independence.

use std::sync::Arc;
use std::time::Duration;

use codeweave_agent::test_helpers::{
    InterruptedStreamProvider, PendingProvider, SequentialMockProvider, make_tool_call,
};
use codeweave_agent::{AgentStreamEvent, OrchestrationRequest, Orchestrator, Outcome};
use codeweave_core::error::ProviderError;
use codeweave_core::event::EventBus;
use codeweave_core::file::{FileSnapshot, ProjectFile};
use codeweave_core::provider::Provider;
use codeweave_memory::InMemoryKnowledgeStore;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn project() -> Arc<FileSnapshot> {
    Arc::new(FileSnapshot::new(vec![
        ProjectFile::new("src/app.ts", "console.log('hi')\n"),
        ProjectFile::new("src/math.ts", "export const add = (a, b) => a - b;\n"),
    ]))
}

fn orchestrator(provider: Arc<dyn Provider>) -> Arc<Orchestrator> {
    Arc::new(
        Orchestrator::new(Arc::new(InMemoryKnowledgeStore::new()), Arc::new(EventBus::default()))
            .with_provider(provider)
            .with_model("mock-model")
            .with_streaming(true),
    )
}

fn fix_add() -> SequentialMockProvider {
    SequentialMockProvider::tool_then_answer(
        vec![make_tool_call(
            "update_file",
            json!({"path": "src/math.ts", "content": "export const add = (a, b) => a + b;\n"}),
        )],
        "Found it.",
        "Fixed the sign in add.",
    )
}

async fn collect(mut rx: mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn stream_reports_progress_and_ends_with_done() {
    let orch = orchestrator(Arc::new(fix_add().with_chunk_size(3)));
    let events = collect(orch.run_stream(OrchestrationRequest::new(project(), "add is broken"))).await;

    let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert!(kinds.contains(&"chunk"));
    assert!(kinds.contains(&"tool_call"));
    assert!(kinds.contains(&"diff"));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().unwrap().is_terminal());

    assert!(events.iter().any(|e| matches!(
        e,
        AgentStreamEvent::Status { message } if message == "Preparing update_file..."
    )));

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            AgentStreamEvent::Chunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "Found it.Fixed the sign in add.");

    match events.last().unwrap() {
        AgentStreamEvent::Done { text, turns, outcome } => {
            assert_eq!(text, "Found it.\n\nFixed the sign in add.");
            assert_eq!(*turns, 2);
            assert_eq!(*outcome, Outcome::Completed);
        }
        other => panic!("expected done, got {other:?}"),
    }
}

#[tokio::test]
async fn chunk_boundaries_do_not_change_the_result() {
    let mut runs = Vec::new();
    for size in [1, 2, 5, 64] {
        let orch = orchestrator(Arc::new(fix_add().with_chunk_size(size)));
        let result = orch.run(OrchestrationRequest::new(project(), "add is broken")).await.unwrap();
        let diffs: Vec<_> = result
            .diffs
            .iter()
            .map(|d| (d.file_name.clone(), d.new_content.clone()))
            .collect();
        runs.push((result.invocations, diffs, result.text));
    }
    assert!(runs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(runs[0].1, vec![(
        "src/math.ts".to_string(),
        "export const add = (a, b) => a + b;\n".to_string()
    )]);
}

#[tokio::test(start_paused = true)]
async fn retried_stream_does_not_repeat_sent_text() {
    let provider = InterruptedStreamProvider::new(
        "Hello ",
        SequentialMockProvider::single_text("Hello world").with_chunk_size(6),
    );
    let orch = orchestrator(Arc::new(provider));
    let events = collect(orch.run_stream(OrchestrationRequest::new(project(), "greet"))).await;

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            AgentStreamEvent::Chunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "Hello world");
    match events.last().unwrap() {
        AgentStreamEvent::Done { text, outcome, .. } => {
            assert_eq!(text, "Hello world");
            assert_eq!(*outcome, Outcome::Completed);
        }
        other => panic!("expected done, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_failure_yields_single_error_event() {
    let provider = SequentialMockProvider::scripted(vec![Err(ProviderError::AuthenticationFailed("nope".into()))]);
    let orch = orchestrator(Arc::new(provider));
    let events = collect(orch.run_stream(OrchestrationRequest::new(project(), "hi"))).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], AgentStreamEvent::Error { message } if message.contains("nope")));
}

#[tokio::test]
async fn validation_failure_yields_error_event() {
    let orch = orchestrator(Arc::new(SequentialMockProvider::single_text("x")));
    let events = collect(orch.run_stream(OrchestrationRequest::new(project(), ""))).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "error");
}

#[tokio::test]
async fn cancelled_stream_ends_with_aborted_done() {
    let cancel = CancellationToken::new();
    let orch = orchestrator(Arc::new(PendingProvider));
    let rx = orch.run_stream(OrchestrationRequest::new(project(), "hi").with_cancel(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let events = collect(rx).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        AgentStreamEvent::Done { outcome: Outcome::Aborted, turns: 0, .. }
    ));
}
