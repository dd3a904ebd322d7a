//! Claude (Anthropic) LLM provider implementation
//!
//! SECURITY: API keys are ONLY sent to official Anthropic endpoints.
//! The ANTHROPIC_API_KEY is never sent to any third-party services.

#![allow(dead_code)]

use super::streaming::SseDecoder;
use super::{
    LlmError, LlmProvider, LlmResponse, Message, MessageContent, Role, StreamCallback,
    StreamEvent, StreamingResponseBuilder, TokenUsage, ToolCall, ToolDefinition,
};
use crate::llm::ContentPart;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Official Anthropic API endpoint - API key is ONLY sent here
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeProvider {
    /// Build from the environment. The key is read lazily by callers that
    /// construct the provider per request, so a missing key surfaces as a
    /// request-time error rather than a startup failure.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url: ANTHROPIC_API_URL.to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the endpoint. Test plumbing only.
    #[cfg(test)]
    fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<ClaudeMessage>) {
        let mut system_prompt = None;
        let mut claude_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let Some(text) = msg.content.as_text() {
                        system_prompt = Some(text.to_string());
                    }
                }
                Role::User => {
                    if let Some(text) = msg.content.as_text() {
                        claude_messages.push(ClaudeMessage {
                            role: "user".to_string(),
                            content: ClaudeContent::Text(text.to_string()),
                        });
                    }
                }
                Role::Assistant => match &msg.content {
                    MessageContent::Text(text) => {
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Text(text.clone()),
                        });
                    }
                    MessageContent::Parts(parts) => {
                        let blocks: Vec<ClaudeContentBlock> = parts
                            .iter()
                            .map(|part| match part {
                                ContentPart::Text { text } => {
                                    ClaudeContentBlock::Text { text: text.clone() }
                                }
                                ContentPart::ToolUse { id, name, input } => {
                                    ClaudeContentBlock::ToolUse {
                                        id: id.clone(),
                                        name: name.clone(),
                                        input: input.clone(),
                                    }
                                }
                                ContentPart::ToolResult {
                                    tool_use_id,
                                    content,
                                } => ClaudeContentBlock::ToolResult {
                                    tool_use_id: tool_use_id.clone(),
                                    content: content.clone(),
                                },
                            })
                            .collect();
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Blocks(blocks),
                        });
                    }
                },
                Role::Tool => {
                    if let (Some(text), Some(tool_id)) = (msg.content.as_text(), &msg.tool_call_id)
                    {
                        claude_messages.push(ClaudeMessage {
                            role: "user".to_string(),
                            content: ClaudeContent::Blocks(vec![ClaudeContentBlock::ToolResult {
                                tool_use_id: tool_id.clone(),
                                content: text.to_string(),
                            }]),
                        });
                    }
                }
            }
        }

        (system_prompt, claude_messages)
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<ClaudeTool> {
        tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        stream: bool,
    ) -> ClaudeRequest {
        let (system, claude_messages) = self.convert_messages(messages);
        let tools = tools
            .filter(|t| !t.is_empty())
            .map(|t| self.convert_tools(t));
        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages: claude_messages,
            tools,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, request: &ClaudeRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        let request = self.build_request(messages, tools, false);
        let response = self.send(&request).await?;

        let parsed: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let usage = parsed.usage.map(TokenUsage::from);
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in parsed.content {
            match block {
                ClaudeContentBlock::Text { text } => text_parts.push(text),
                ClaudeContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: input,
                    });
                }
                ClaudeContentBlock::ToolResult { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            Ok(LlmResponse::Text {
                text: text_parts.join("\n"),
                usage,
            })
        } else if text_parts.is_empty() {
            Ok(LlmResponse::ToolCalls {
                calls: tool_calls,
                usage,
            })
        } else {
            Ok(LlmResponse::Mixed {
                text: Some(text_parts.join("\n")),
                tool_calls,
                usage,
            })
        }
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        callback: StreamCallback,
        interrupt_check: Option<&(dyn Fn() -> bool + Send + Sync)>,
    ) -> Result<LlmResponse, LlmError> {
        let request = self.build_request(messages, tools, true);
        let response = self.send(&request).await?;

        let mut state = StreamState::default();
        let mut decoder = SseDecoder::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            if let Some(check) = interrupt_check {
                if check() {
                    return Err(LlmError::Interrupted);
                }
            }
            let chunk = chunk.map_err(LlmError::from_network_error)?;
            for payload in decoder.push(&chunk) {
                for event in state.process_payload(&payload)? {
                    callback(event);
                }
            }
        }
        for payload in decoder.finish() {
            for event in state.process_payload(&payload)? {
                callback(event);
            }
        }
        callback(StreamEvent::Done);

        Ok(state.finish())
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

/// Accumulates the wire stream into an [`LlmResponse`], tracking which
/// content-block index belongs to which tool call.
#[derive(Default)]
struct StreamState {
    builder: StreamingResponseBuilder,
    block_ids: HashMap<u64, String>,
    input_tokens: u32,
    output_tokens: u32,
}

impl StreamState {
    fn process_payload(&mut self, payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let parsed: StreamPayload =
            serde_json::from_str(payload).map_err(|e| LlmError::Decode(e.to_string()))?;

        let mut events = Vec::new();
        match parsed {
            StreamPayload::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.input_tokens = usage.input_tokens;
                }
            }
            StreamPayload::ContentBlockStart {
                index,
                content_block,
            } => {
                if let StartedBlock::ToolUse { id, name } = content_block {
                    self.block_ids.insert(index, id.clone());
                    events.push(StreamEvent::ToolCallStart { id, name });
                }
            }
            StreamPayload::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => {
                    events.push(StreamEvent::TextDelta(text));
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(id) = self.block_ids.get(&index) {
                        events.push(StreamEvent::ToolCallDelta {
                            id: id.clone(),
                            arguments_delta: partial_json,
                        });
                    }
                }
                BlockDelta::Unknown => {}
            },
            StreamPayload::ContentBlockStop { index } => {
                if let Some(id) = self.block_ids.get(&index) {
                    events.push(StreamEvent::ToolCallComplete { id: id.clone() });
                }
            }
            StreamPayload::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    self.output_tokens = usage.output_tokens;
                }
            }
            StreamPayload::Error { error } => {
                return Err(LlmError::ServiceError(error.message));
            }
            StreamPayload::MessageStop | StreamPayload::Ping | StreamPayload::Unknown => {}
        }

        for event in &events {
            self.builder.process(event);
        }
        Ok(events)
    }

    fn finish(mut self) -> LlmResponse {
        if self.input_tokens > 0 || self.output_tokens > 0 {
            self.builder.set_usage(TokenUsage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                total_tokens: self.input_tokens + self.output_tokens,
            });
        }
        self.builder.build()
    }
}

// Claude API request/response types

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: ClaudeContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    #[allow(dead_code)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<ClaudeUsage> for TokenUsage {
    fn from(usage: ClaudeUsage) -> Self {
        TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        }
    }
}

// Streaming wire events

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    MessageStart {
        message: StreamMessageStart,
    },
    ContentBlockStart {
        index: u64,
        content_block: StartedBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u64,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<ClaudeUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct StreamMessageStart {
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StartedBlock {
    Text {},
    ToolUse { id: String, name: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> ClaudeProvider {
        ClaudeProvider::new("test-key".to_string())
    }

    #[test]
    fn system_message_lifts_out_of_the_transcript() {
        let messages = vec![
            Message::system("Sos el asistente de Petshop Kat."),
            Message::user("¿Cómo está el stock?"),
        ];
        let (system, converted) = provider().convert_messages(&messages);

        assert_eq!(system.as_deref(), Some("Sos el asistente de Petshop Kat."));
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
    }

    #[test]
    fn tool_results_become_user_blocks() {
        let messages = vec![Message::tool_result("call_1", "{\"type\":\"error\"}")];
        let (_, converted) = provider().convert_messages(&messages);

        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        match &converted[0].content {
            ClaudeContent::Blocks(blocks) => {
                assert!(matches!(
                    &blocks[0],
                    ClaudeContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"
                ));
            }
            ClaudeContent::Text(_) => panic!("expected blocks"),
        }
    }

    #[test]
    fn assistant_tool_calls_echo_as_tool_use_blocks() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "get_stock_alerts".to_string(),
            arguments: json!({"days": 30}),
        }];
        let messages = vec![Message::assistant_tool_calls(None, &calls)];
        let (_, converted) = provider().convert_messages(&messages);

        assert_eq!(converted[0].role, "assistant");
        match &converted[0].content {
            ClaudeContent::Blocks(blocks) => {
                assert!(matches!(
                    &blocks[0],
                    ClaudeContentBlock::ToolUse { name, .. } if name == "get_stock_alerts"
                ));
            }
            ClaudeContent::Text(_) => panic!("expected blocks"),
        }
    }

    #[test]
    fn request_serializes_tools_as_input_schema() {
        let tools = vec![ToolDefinition {
            name: "get_current_stock".to_string(),
            description: "Inventario actual".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let request = provider().build_request(&[Message::user("hola")], Some(&tools), true);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "claude-sonnet-4-20250514");
        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(value["stream"], true);
        assert_eq!(value["tools"][0]["name"], "get_current_stock");
        assert!(value["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn stream_state_reassembles_a_tool_call() {
        let mut state = StreamState::default();
        let payloads = [
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 12}}}),
            json!({"type": "content_block_start", "index": 0,
                   "content_block": {"type": "tool_use", "id": "call_1", "name": "predict_product"}}),
            json!({"type": "content_block_delta", "index": 0,
                   "delta": {"type": "input_json_delta", "partial_json": "{\"name\":\"Puri"}}),
            json!({"type": "content_block_delta", "index": 0,
                   "delta": {"type": "input_json_delta", "partial_json": "na 20kg\"}"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "message_delta", "usage": {"output_tokens": 30}}),
            json!({"type": "message_stop"}),
        ];
        for payload in payloads {
            state.process_payload(&payload.to_string()).unwrap();
        }

        let response = state.finish();
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].arguments, json!({"name": "Purina 20kg"}));
        let usage = response.usage().unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn stream_state_passes_text_deltas_through() {
        let mut state = StreamState::default();
        let events = state
            .process_payload(
                &json!({"type": "content_block_delta", "index": 0,
                        "delta": {"type": "text_delta", "text": "Hola"}})
                .to_string(),
            )
            .unwrap();

        assert!(matches!(&events[0], StreamEvent::TextDelta(t) if t == "Hola"));
    }

    #[test]
    fn stream_error_event_becomes_service_error() {
        let mut state = StreamState::default();
        let err = state
            .process_payload(
                &json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})
                    .to_string(),
            )
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceError(_)));
    }

    #[test]
    fn unknown_stream_events_are_ignored() {
        let mut state = StreamState::default();
        let events = state
            .process_payload(&json!({"type": "content_block_flourish"}).to_string())
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn http_error_maps_to_typed_error() {
        use axum::http::StatusCode;
        use axum::routing::post;
        use axum::Router;

        let router = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limit") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let provider =
            ClaudeProvider::new("k".to_string()).with_api_url(format!("http://{addr}/v1/messages"));
        let err = provider
            .chat(&[Message::user("hola")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
    }
}
