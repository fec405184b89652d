//! `codeweave run`: One request against a project directory.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use codeweave_agent::prompt::Mode;
use codeweave_agent::{AgentStreamEvent, OrchestrationRequest, Orchestrator, Outcome};
use codeweave_config::AppConfig;
use codeweave_core::event::{DomainEvent, EventBus};
use codeweave_core::file::{DiffOp, FileDiff};
use codeweave_core::knowledge::KnowledgeStore;
use codeweave_memory::{FileKnowledgeStore, InMemoryKnowledgeStore, NoopKnowledgeStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::snapshot;

pub struct RunArgs {
    pub dir: PathBuf,
    pub request: String,
    pub active: Option<String>,
    pub mode: Mode,
    pub stream: bool,
    pub compression: bool,
    pub high_capacity: bool,
    pub summary: Option<String>,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let snapshot = Arc::new(
        snapshot::load_dir(&args.dir).map_err(|e| format!("Failed to read {}: {e}", args.dir.display()))?,
    );
    if snapshot.is_empty() {
        eprintln!("  Note: no text files found under {}", args.dir.display());
    }

    // A missing key is reported here; the orchestrator would only say "no provider"
    let provider = codeweave_providers::build_from_config(&config.provider).map_err(|e| {
        format!(
            "{e}\n  Set CODEWEAVE_API_KEY or add provider.api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let events = Arc::new(EventBus::default());
    spawn_event_logger(&events);

    let orchestrator = Arc::new(Orchestrator::from_config(
        &config,
        Some(provider),
        knowledge_store(&config),
        events,
    ));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut request = OrchestrationRequest::new(snapshot, args.request)
        .with_mode(args.mode)
        .with_compression(args.compression)
        .with_high_capacity(args.high_capacity)
        .with_cancel(cancel);
    if let Some(active) = args.active {
        request = request.with_active_file(active);
    }
    if let Some(summary) = args.summary {
        request = request.with_project_summary(summary);
    }

    if args.stream || config.orchestrator.streaming {
        run_streaming(&orchestrator, request).await
    } else {
        let result = orchestrator.run(request).await?;
        println!("{}", result.text);
        print_diffs(&result.diffs);
        match result.outcome {
            Outcome::Aborted => eprintln!("  [cancelled after {} turn(s)]", result.turns),
            Outcome::Failed => eprintln!("  [stopped: {}]", result.failure.unwrap_or_default()),
            Outcome::Completed | Outcome::TurnLimitReached => {}
        }
        Ok(())
    }
}

async fn run_streaming(
    orchestrator: &Arc<Orchestrator>,
    request: OrchestrationRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rx = orchestrator.run_stream(request);
    let mut diffs = Vec::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::Chunk { content } => {
                print!("{content}");
                stdout.flush()?;
            }
            AgentStreamEvent::Status { message } => eprintln!("\n  ... {message}"),
            AgentStreamEvent::ToolCall { name, .. } => eprintln!("\n  -> {name}"),
            AgentStreamEvent::Diff { diff } => diffs.push(diff),
            AgentStreamEvent::Done { outcome, turns, .. } => {
                println!();
                print_diffs(&diffs);
                if outcome == Outcome::Aborted {
                    eprintln!("  [cancelled after {turns} turn(s)]");
                }
            }
            AgentStreamEvent::Error { message } => {
                println!();
                print_diffs(&diffs);
                return Err(message.into());
            }
        }
    }
    Ok(())
}

fn knowledge_store(config: &AppConfig) -> Arc<dyn KnowledgeStore> {
    match config.knowledge.backend.as_str() {
        "file" => Arc::new(FileKnowledgeStore::new(config.knowledge_path())),
        "none" => Arc::new(NoopKnowledgeStore),
        _ => Arc::new(InMemoryKnowledgeStore::new()),
    }
}

/// Log domain events at debug level; visible with `--verbose`.
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                        debug!(tool = %tool_name, success, duration_ms, "Tool executed")
                    }
                    DomainEvent::ModelCallRetried { attempt, delay_ms, .. } => {
                        warn!(attempt, delay_ms, "Model call retried")
                    }
                    other => debug!(event = ?other, "Domain event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => debug!(skipped = n, "Event logger lagged"),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_diffs(diffs: &[FileDiff]) {
    if diffs.is_empty() {
        return;
    }
    println!();
    println!("Proposed changes ({}):", diffs.len());
    for diff in diffs {
        println!("{}", summarize(diff));
    }
}

/// One-line unified-style summary of a proposed diff.
fn summarize(diff: &FileDiff) -> String {
    let (added, removed) = diff.line_delta();
    let (from, to) = match diff.op {
        DiffOp::Create => ("/dev/null".to_string(), format!("b/{}", diff.file_name)),
        DiffOp::Update => (format!("a/{}", diff.file_name), format!("b/{}", diff.file_name)),
        DiffOp::Delete => (format!("a/{}", diff.file_name), "/dev/null".to_string()),
    };
    format!("  --- {from} +++ {to}  (+{added} -{removed})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweave_core::file::ProjectFile;

    #[test]
    fn summaries_follow_unified_headers() {
        let created = FileDiff::create("src/new.ts", "a\nb\n");
        assert_eq!(summarize(&created), "  --- /dev/null +++ b/src/new.ts  (+2 -0)");

        let original = ProjectFile::new("src/old.ts", "x\ny\n");
        let updated = FileDiff::update(&original, "x\nz\n");
        assert_eq!(summarize(&updated), "  --- a/src/old.ts +++ b/src/old.ts  (+1 -1)");

        let deleted = FileDiff::delete(&original);
        assert_eq!(summarize(&deleted), "  --- a/src/old.ts +++ /dev/null  (+0 -2)");
    }

    #[test]
    fn backend_selects_store() {
        let mut config = AppConfig::default();
        config.knowledge.backend = "none".into();
        assert_eq!(knowledge_store(&config).name(), "none");
        config.knowledge.backend = "memory".into();
        assert_eq!(knowledge_store(&config).name(), "memory");
    }
}
