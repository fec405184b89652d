//! Scripted providers shared by unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use codeweave_core::error::ProviderError;
use codeweave_core::message::{Message, MessageToolCall};
use codeweave_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallFragment, Usage};
use tokio::sync::{Mutex, mpsc};

/// A mock provider that plays back a script of replies, one per call.
///
/// Once the script runs out every call fails with `NotConfigured`. With a
/// chunk size set, `stream` splits each reply into fragments of that many
/// characters, so tests can vary chunk boundaries.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    chunk_size: Option<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Script that may include failures.
    pub fn scripted(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            chunk_size: None,
        }
    }

    /// A provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// A provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![make_tool_call_response(tool_calls, thought), make_text_response(answer)])
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    async fn next(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().await.push(request);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("mock script exhausted".into())))
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.next(request).await
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let response = self.next(request).await?;
        let size = self.chunk_size.unwrap_or(usize::MAX);
        let chunks = split_response(&response, size);
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}

/// Streams `partial` and then fails with `StreamInterrupted` on the first
/// stream call; later calls are delegated to `inner`.
pub struct InterruptedStreamProvider {
    partial: String,
    interrupted: AtomicBool,
    inner: SequentialMockProvider,
}

impl InterruptedStreamProvider {
    pub fn new(partial: &str, inner: SequentialMockProvider) -> Self {
        Self {
            partial: partial.to_string(),
            interrupted: AtomicBool::new(false),
            inner,
        }
    }
}

#[async_trait]
impl Provider for InterruptedStreamProvider {
    fn name(&self) -> &str {
        "interrupted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.inner.complete(request).await
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            return self.inner.stream(request).await;
        }
        let (tx, rx) = mpsc::channel(2);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(self.partial.clone()),
                ..Default::default()
            }))
            .await;
        let _ = tx
            .send(Err(ProviderError::StreamInterrupted("connection reset".into())))
            .await;
        Ok(rx)
    }
}

/// Plays back `script`, then hangs on every later call. For cancelling a
/// run after some turns have completed.
pub struct StallingProvider {
    inner: SequentialMockProvider,
    answers: usize,
}

impl StallingProvider {
    pub fn new(script: Vec<ProviderResponse>) -> Self {
        Self {
            answers: script.len(),
            inner: SequentialMockProvider::new(script),
        }
    }
}

#[async_trait]
impl Provider for StallingProvider {
    fn name(&self) -> &str {
        "stalling_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.inner.call_count().await >= self.answers {
            return std::future::pending().await;
        }
        self.inner.complete(request).await
    }
}

/// A provider whose calls never finish. For cancellation tests.
pub struct PendingProvider;

#[async_trait]
impl Provider for PendingProvider {
    fn name(&self) -> &str {
        "pending"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

fn pieces(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn split_response(response: &ProviderResponse, size: usize) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = pieces(&response.message.content, size)
        .into_iter()
        .map(|content| StreamChunk {
            content: Some(content),
            ..Default::default()
        })
        .collect();

    for (index, call) in response.message.tool_calls.iter().enumerate() {
        let mut fragments = vec![ToolCallFragment {
            index,
            id: Some(call.id.clone()),
            name: None,
            arguments: None,
        }];
        fragments.extend(pieces(&call.name, size).into_iter().map(|name| ToolCallFragment {
            index,
            id: None,
            name: Some(name),
            arguments: None,
        }));
        fragments.extend(pieces(&call.arguments, size).into_iter().map(|arguments| ToolCallFragment {
            index,
            id: None,
            name: None,
            arguments: Some(arguments),
        }));
        chunks.extend(fragments.into_iter().map(|fragment| StreamChunk {
            tool_calls: vec![fragment],
            ..Default::default()
        }));
    }

    chunks.push(StreamChunk {
        done: true,
        usage: response.usage.clone(),
        ..Default::default()
    });
    chunks
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(thought, tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call. The id is derived from the name.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
