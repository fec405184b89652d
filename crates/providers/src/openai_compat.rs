//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` with function calling.
//!
//! Tool calls are passed through raw: `complete` returns the argument text
//! exactly as the service produced it, and `stream` forwards each tool-call
//! delta as a [`ToolCallFragment`] keyed by index. Reassembly and argument
//! repair happen in the orchestrator, not here.

use std::time::Duration;

use async_trait::async_trait;
use codeweave_core::error::ProviderError;
use codeweave_core::message::{Message, MessageToolCall, Role};
use codeweave_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An OpenAI-compatible completion service.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Local Ollama; no key required.
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new("ollama", base_url.unwrap_or("http://localhost:11434/v1"), "ollama")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    async fn post(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();

        match status {
            200 => Ok(response),
            429 => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Err(ProviderError::RateLimited { retry_after_secs })
            }
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            404 => Err(ProviderError::ModelNotFound(
                body["model"].as_str().unwrap_or_default().to_string(),
            )),
            _ => {
                let message = response.text().await.unwrap_or_default();
                warn!(provider = %self.name, status, body = %message, "Provider returned error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message,
                })
            }
        }
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self.post(&Self::request_body(&request, false), false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;
        parse_completion(api_response)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self.post(&Self::request_body(&request, true), true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };
                for event in parser.push(&bytes) {
                    match event {
                        SseEvent::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                trace!(provider = %provider_name, "Stream receiver dropped");
                                return;
                            }
                        }
                        SseEvent::Done => {
                            let _ = tx.send(Ok(StreamChunk { done: true, ..Default::default() })).await;
                            return;
                        }
                    }
                }
            }

            // Connection closed without [DONE]
            let _ = tx.send(Ok(StreamChunk { done: true, ..Default::default() })).await;
        });

        Ok(rx)
    }
}

fn parse_completion(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let tool_calls: Vec<MessageToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let content = choice.message.content.unwrap_or_default();
    Ok(ProviderResponse {
        message: Message::assistant_with_tools(content, tool_calls),
        usage: api_response.usage.map(Usage::from),
        model: api_response.model,
    })
}

/// Events produced by the SSE line parser.
#[derive(Debug, Clone)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
}

/// Splits the SSE byte stream into `data:` payloads and decodes them.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network reads is decoded whole.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    fn push(&mut self, bytes: impl AsRef<[u8]>) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes.as_ref());
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
                break;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    if let Some(chunk) = resp.into_chunk() {
                        events.push(SseEvent::Chunk(chunk));
                    }
                }
                Err(e) => trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk"),
            }
        }
        events
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl StreamResponse {
    /// `None` when the payload carries nothing worth forwarding.
    fn into_chunk(self) -> Option<StreamChunk> {
        let mut chunk = StreamChunk {
            usage: self.usage.map(Usage::from),
            ..Default::default()
        };
        if let Some(choice) = self.choices.into_iter().next() {
            chunk.content = choice.delta.content.filter(|c| !c.is_empty());
            chunk.tool_calls = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|d| ToolCallFragment {
                    index: d.index,
                    id: d.id,
                    name: d.function.as_ref().and_then(|f| f.name.clone()),
                    arguments: d.function.and_then(|f| f.arguments),
                })
                .collect();
        }
        let empty = chunk.content.is_none() && chunk.tool_calls.is_empty() && chunk.usage.is_none();
        (!empty).then_some(chunk)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(events: Vec<SseEvent>) -> Vec<StreamChunk> {
        events
            .into_iter()
            .filter_map(|e| match e {
                SseEvent::Chunk(c) => Some(c),
                SseEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn constructors_set_base_url() {
        let p = OpenAiCompatProvider::openrouter("sk-test").unwrap();
        assert_eq!(p.name(), "openrouter");
        assert!(p.base_url().contains("openrouter.ai"));

        let p = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "k").unwrap();
        assert_eq!(p.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion_keeps_tool_links() {
        let call = MessageToolCall {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: r#"{"path":"a.ts"}"#.into(),
        };
        let messages = vec![
            Message::system("rules"),
            Message::assistant_with_tools("", vec![call]),
            Message::tool_result("call_1", "contents"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].tool_calls.as_ref().unwrap()[0].function.name, "read_file");
        assert_eq!(api[2].role, "tool");
        assert_eq!(api[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_includes_tools_only_when_declared() {
        let mut req = ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(100),
            tools: vec![],
            stream: false,
        };
        let body = OpenAiCompatProvider::request_body(&req, false);
        assert!(body.get("tools").is_none());
        assert_eq!(body["max_tokens"], 100);

        req.tools.push(ToolDefinition {
            name: "list_files".into(),
            description: "List".into(),
            parameters: serde_json::json!({"type": "object"}),
        });
        let body = OpenAiCompatProvider::request_body(&req, true);
        assert_eq!(body["tools"][0]["function"]["name"], "list_files");
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn complete_keeps_malformed_arguments_raw() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "read_file", "arguments": "{path: 'a.ts',}"}}
            ]}}]
        }"#;
        let resp = parse_completion(serde_json::from_str(data).unwrap()).unwrap();
        assert_eq!(resp.message.content, "");
        assert_eq!(resp.message.tool_calls[0].arguments, "{path: 'a.ts',}");
    }

    #[test]
    fn complete_without_choices_is_an_error() {
        let data = r#"{"model": "m", "choices": []}"#;
        assert!(parse_completion(serde_json::from_str(data).unwrap()).is_err());
    }

    #[test]
    fn sse_tool_deltas_forwarded_as_fragments() {
        let mut parser = SseParser::default();
        let events = parser.push(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"read_\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"file\",\"arguments\":\"{\\\"path\\\"\"}}]}}]}\n",
        ));
        let out = chunks(events);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].tool_calls[0].id.as_deref(), Some("call_a"));
        assert_eq!(out[0].tool_calls[0].name.as_deref(), Some("read_"));
        assert_eq!(out[1].tool_calls[0].name.as_deref(), Some("file"));
        assert_eq!(out[1].tool_calls[0].arguments.as_deref(), Some("{\"path\""));
    }

    #[test]
    fn sse_lines_split_across_pushes() {
        let mut parser = SseParser::default();
        assert!(parser.push("data: {\"choices\":[{\"delta\":{\"content\":\"Hel").is_empty());
        let out = chunks(parser.push("lo\"}}]}\n\n"));
        assert_eq!(out[0].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn sse_multibyte_char_split_across_reads() {
        let payload = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut parser = SseParser::default();
        assert!(parser.push(&payload[..split]).is_empty());
        let out = chunks(parser.push(&payload[split..]));
        assert_eq!(out[0].content.as_deref(), Some("café"));
    }

    #[test]
    fn sse_done_and_comments() {
        let mut parser = SseParser::default();
        let events = parser.push(": keep-alive\n\ndata: [DONE]\n");
        assert!(matches!(events.as_slice(), [SseEvent::Done]));
    }

    #[test]
    fn sse_usage_and_empty_deltas() {
        let mut parser = SseParser::default();
        let out = chunks(parser.push(concat!(
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n",
            "data: not json\n",
        )));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].usage.as_ref().unwrap().total_tokens, 15);
    }
}
