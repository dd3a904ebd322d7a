//! Shared types for LLM providers

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| {
                if let ContentPart::Text { text } = p {
                    Some(text.as_str())
                } else {
                    None
                }
            }),
        }
    }
}

/// Part of a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
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

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tool calls, preserved verbatim so the
    /// provider can echo the tool_use blocks back in the next request.
    pub fn assistant_tool_calls(text: Option<String>, calls: &[ToolCall]) -> Self {
        let mut parts = Vec::new();
        if let Some(text) = text {
            if !text.is_empty() {
                parts.push(ContentPart::Text { text });
            }
        }
        for call in calls {
            parts.push(ContentPart::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            });
        }
        Self {
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(content.into()),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Definition of a tool for the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an LLM
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// Plain text response
    Text {
        text: String,
        usage: Option<TokenUsage>,
    },
    /// Tool calls requested by the model
    ToolCalls {
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// Mixed response with text and tool calls
    Mixed {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
}

impl LlmResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            LlmResponse::Text { text, .. } => Some(text),
            LlmResponse::Mixed { text, .. } => text.as_deref(),
            LlmResponse::ToolCalls { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            LlmResponse::ToolCalls { calls, .. } => calls,
            LlmResponse::Mixed { tool_calls, .. } => tool_calls,
            LlmResponse::Text { .. } => &[],
        }
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            LlmResponse::Text { usage, .. } => usage.as_ref(),
            LlmResponse::ToolCalls { usage, .. } => usage.as_ref(),
            LlmResponse::Mixed { usage, .. } => usage.as_ref(),
        }
    }
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Events emitted during streaming responses
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Regular text chunk from the assistant
    TextDelta(String),
    /// Tool call started
    ToolCallStart { id: String, name: String },
    /// Tool call arguments chunk (arguments come incrementally)
    ToolCallDelta { id: String, arguments_delta: String },
    /// Tool call completed (all arguments received)
    ToolCallComplete { id: String },
    /// Stream completed successfully
    Done,
    /// Error during streaming
    Error(String),
}

/// Callback type for streaming events
///
/// Called for each chunk as it arrives from the LLM. Implementations
/// should be fast and non-blocking.
pub type StreamCallback = Box<dyn Fn(StreamEvent) + Send + Sync>;

/// Builder for accumulating a streaming response
///
/// Tool calls keep their arrival order; the chat loop executes them in the
/// order the model issued them.
#[derive(Debug, Default)]
pub struct StreamingResponseBuilder {
    text: String,
    tool_calls: Vec<(String, String, String)>,
    usage: Option<TokenUsage>,
}

impl StreamingResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_usage(&mut self, usage: TokenUsage) {
        self.usage = Some(usage);
    }

    /// Process a stream event and accumulate content
    pub fn process(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => {
                self.text.push_str(text);
            }
            StreamEvent::ToolCallStart { id, name } => {
                self.tool_calls
                    .push((id.clone(), name.clone(), String::new()));
            }
            StreamEvent::ToolCallDelta {
                id,
                arguments_delta,
            } => {
                if let Some((_, _, args)) =
                    self.tool_calls.iter_mut().find(|(call_id, _, _)| call_id == id)
                {
                    args.push_str(arguments_delta);
                }
            }
            StreamEvent::ToolCallComplete { .. } | StreamEvent::Done | StreamEvent::Error(_) => {}
        }
    }

    /// Build the final LlmResponse
    pub fn build(self) -> LlmResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .map(|(id, name, args)| {
                // An empty argument stream means the tool takes no input.
                let arguments = if args.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&args).unwrap_or(serde_json::Value::Null)
                };
                ToolCall {
                    id,
                    name,
                    arguments,
                }
            })
            .collect();

        if tool_calls.is_empty() {
            LlmResponse::Text {
                text: self.text,
                usage: self.usage,
            }
        } else if self.text.is_empty() {
            LlmResponse::ToolCalls {
                calls: tool_calls,
                usage: self.usage,
            }
        } else {
            LlmResponse::Mixed {
                text: Some(self.text),
                tool_calls,
                usage: self.usage,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_accumulates_text() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::TextDelta("Hola".to_string()));
        builder.process(&StreamEvent::TextDelta(", mundo".to_string()));

        let response = builder.build();
        assert_eq!(response.text(), Some("Hola, mundo"));
        assert!(response.tool_calls().is_empty());
    }

    #[test]
    fn builder_reassembles_chunked_tool_arguments() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::ToolCallStart {
            id: "call_1".to_string(),
            name: "predict_product".to_string(),
        });
        builder.process(&StreamEvent::ToolCallDelta {
            id: "call_1".to_string(),
            arguments_delta: "{\"name\":".to_string(),
        });
        builder.process(&StreamEvent::ToolCallDelta {
            id: "call_1".to_string(),
            arguments_delta: "\"Purina 20kg\"}".to_string(),
        });
        builder.process(&StreamEvent::ToolCallComplete {
            id: "call_1".to_string(),
        });

        let response = builder.build();
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "predict_product");
        assert_eq!(calls[0].arguments, json!({"name": "Purina 20kg"}));
    }

    #[test]
    fn builder_preserves_tool_call_order() {
        let mut builder = StreamingResponseBuilder::new();
        for (id, name) in [("a", "get_current_stock"), ("b", "get_stock_alerts")] {
            builder.process(&StreamEvent::ToolCallStart {
                id: id.to_string(),
                name: name.to_string(),
            });
        }

        let response = builder.build();
        let names: Vec<&str> = response.tool_calls().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_current_stock", "get_stock_alerts"]);
    }

    #[test]
    fn empty_arguments_default_to_an_object() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::ToolCallStart {
            id: "call_1".to_string(),
            name: "get_current_stock".to_string(),
        });

        let response = builder.build();
        assert_eq!(response.tool_calls()[0].arguments, json!({}));
    }

    #[test]
    fn mixed_response_keeps_both_text_and_calls() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::TextDelta("Reviso el stock.".to_string()));
        builder.process(&StreamEvent::ToolCallStart {
            id: "call_1".to_string(),
            name: "get_stock_alerts".to_string(),
        });

        match builder.build() {
            LlmResponse::Mixed {
                text, tool_calls, ..
            } => {
                assert_eq!(text.as_deref(), Some("Reviso el stock."));
                assert_eq!(tool_calls.len(), 1);
            }
            other => panic!("expected mixed response, got {other:?}"),
        }
    }

    #[test]
    fn assistant_tool_calls_round_trip_through_parts() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "get_demand_summary".to_string(),
            arguments: json!({"days": 7}),
        }];
        let message = Message::assistant_tool_calls(Some("Un momento.".to_string()), &calls);

        assert_eq!(message.role, Role::Assistant);
        match &message.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0], ContentPart::Text { text } if text == "Un momento."));
                assert!(matches!(&parts[1], ContentPart::ToolUse { name, .. } if name == "get_demand_summary"));
            }
            MessageContent::Text(_) => panic!("expected multi-part content"),
        }
    }
}
