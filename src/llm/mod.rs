//! LLM provider layer
//!
//! One production provider (Anthropic) behind a trait so the chat loop can
//! be exercised with scripted providers in tests.

#![allow(dead_code)]

mod claude;
mod error;
pub mod streaming;
mod types;

pub use claude::ClaudeProvider;
pub use error::LlmError;
pub use types::*;

use async_trait::async_trait;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Send a chat completion request (non-streaming)
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError>;

    /// Send a streaming chat completion request
    ///
    /// The callback is invoked for each chunk as it arrives. The interrupt
    /// check is polled between chunks; when it trips, the provider stops
    /// reading and returns [`LlmError::Interrupted`].
    ///
    /// Default implementation falls back to non-streaming `chat()` and
    /// replays the complete response as events.
    async fn chat_streaming(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        callback: StreamCallback,
        interrupt_check: Option<&(dyn Fn() -> bool + Send + Sync)>,
    ) -> Result<LlmResponse, LlmError> {
        if let Some(check) = interrupt_check {
            if check() {
                return Err(LlmError::Interrupted);
            }
        }

        let response = self.chat(messages, tools).await?;

        if let Some(text) = response.text() {
            callback(StreamEvent::TextDelta(text.to_string()));
        }
        for tool_call in response.tool_calls() {
            callback(StreamEvent::ToolCallStart {
                id: tool_call.id.clone(),
                name: tool_call.name.clone(),
            });
            callback(StreamEvent::ToolCallDelta {
                id: tool_call.id.clone(),
                arguments_delta: tool_call.arguments.to_string(),
            });
            callback(StreamEvent::ToolCallComplete {
                id: tool_call.id.clone(),
            });
        }
        callback(StreamEvent::Done);

        Ok(response)
    }

    /// Check if this provider implements native streaming
    fn supports_streaming(&self) -> bool {
        false
    }
}
