//! Conversation loop between the model and the tool registry
//!
//! A turn starts from the user's latest message and runs the model with the
//! tool catalog attached. Tool calls are executed sequentially, their tagged
//! results fed back as tool messages, and the model re-invoked, for at most
//! `max_tool_rounds` rounds. After the cap the model is called once more
//! without tools so the turn always ends in text.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::llm::{
    LlmError, LlmProvider, Message, StreamEvent, TokenUsage, ToolDefinition,
};
use crate::tools::{ToolRegistry, ToolResultData};

/// Assistant persona, in Spanish like the store staff it serves.
pub const SYSTEM_PROMPT: &str = r#"Eres el asistente de IA de una tienda de mascotas (petshop) en El Calafate, Patagonia, Argentina. Tu nombre es "Petshop Kat".

Ayudas al dueño a entender sus ventas, inventario y predicciones de demanda. Responde siempre en español.

Capacidades:
- Consultar alertas de stock (productos agotados, críticos, bajos)
- Predecir ventas futuras por producto, categoría o marca usando modelos ML (XGBoost)
- Ver resúmenes de demanda por categoría y marca
- Generar órdenes de compra sugeridas
- Ver el inventario actual completo
- Listar productos/marcas/categorías disponibles para predicción

Reglas:
- La tienda cierra los domingos, por eso las predicciones omiten esos días
- Usa formato de moneda ARS (pesos argentinos) y formato de números en español argentino
- Cuando no sepas el nombre exacto de un producto/marca/categoría, primero usa get_available_products para listar las opciones
- Sé conciso pero informativo. Incluye datos relevantes en tu respuesta
- Si hay un error en una herramienta, explica el problema al usuario de forma amigable
- Puedes llamar múltiples herramientas en una sola respuesta si es necesario"#;

const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Events surfaced to the caller while a turn runs.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Raw provider stream event (text deltas, tool call framing).
    Stream(StreamEvent),
    /// A tool finished; the same tagged result the model receives.
    ToolResult {
        id: String,
        name: String,
        result: ToolResultData,
    },
}

pub type TurnCallback = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Outcome of one turn.
#[derive(Debug)]
pub struct ChatTurn {
    /// Concatenated assistant text across all rounds; empty when interrupted.
    pub text: String,
    /// How many tool executions the turn performed.
    pub tool_calls_made: usize,
    /// How many times the model was invoked.
    pub rounds: usize,
    /// Aggregate token usage, when the provider reports it.
    pub usage: TokenUsage,
    /// The turn was cut short by the interrupt check.
    pub interrupted: bool,
}

pub struct ChatAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl ChatAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// An interrupted turn commits nothing: partially streamed text is
    /// discarded rather than handed back as a final answer.
    fn abandon(mut turn: ChatTurn) -> ChatTurn {
        turn.text.clear();
        turn.interrupted = true;
        turn
    }

    /// Run one turn over the given conversation history (user and assistant
    /// messages only; the system prompt is prepended here).
    pub async fn run_turn(
        &self,
        history: &[Message],
        callback: TurnCallback,
        interrupt: Arc<AtomicBool>,
    ) -> Result<ChatTurn, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);

        let definitions = self.tools.definitions();
        let mut turn = ChatTurn {
            text: String::new(),
            tool_calls_made: 0,
            rounds: 0,
            usage: TokenUsage::default(),
            interrupted: false,
        };

        loop {
            turn.rounds += 1;
            // After the round cap the model answers without tools, so every
            // turn terminates in text even if the model keeps asking.
            let tools: Option<&[ToolDefinition]> =
                (turn.rounds <= self.max_tool_rounds).then_some(definitions.as_slice());

            let response = {
                let callback = callback.clone();
                let interrupt = interrupt.clone();
                let stream_callback: crate::llm::StreamCallback =
                    Box::new(move |event| callback(TurnEvent::Stream(event)));
                let check = move || interrupt.load(Ordering::Relaxed);
                match self
                    .provider
                    .chat_streaming(&messages, tools, stream_callback, Some(&check))
                    .await
                {
                    Ok(response) => response,
                    Err(LlmError::Interrupted) => return Ok(Self::abandon(turn)),
                    Err(err) => return Err(err),
                }
            };

            if let Some(usage) = response.usage() {
                turn.usage.input_tokens += usage.input_tokens;
                turn.usage.output_tokens += usage.output_tokens;
                turn.usage.total_tokens += usage.total_tokens;
            }
            if let Some(text) = response.text() {
                if !text.is_empty() {
                    if !turn.text.is_empty() {
                        turn.text.push('\n');
                    }
                    turn.text.push_str(text);
                }
            }

            let calls = response.tool_calls();
            if calls.is_empty() || tools.is_none() {
                if !calls.is_empty() {
                    tracing::warn!(
                        rounds = turn.rounds,
                        "model requested tools past the round cap; stopping"
                    );
                }
                return Ok(turn);
            }

            let calls = calls.to_vec();
            messages.push(Message::assistant_tool_calls(
                response.text().map(str::to_string),
                &calls,
            ));

            for call in calls {
                if interrupt.load(Ordering::Relaxed) {
                    return Ok(Self::abandon(turn));
                }
                let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                turn.tool_calls_made += 1;

                let payload = serde_json::to_string(&result)
                    .unwrap_or_else(|_| r#"{"type":"error","data":{"message":"unserializable tool result"}}"#.to_string());
                messages.push(Message::tool_result(call.id.clone(), payload));
                callback(TurnEvent::ToolResult {
                    id: call.id,
                    name: call.name,
                    result,
                });
            }
        }
    }
}
