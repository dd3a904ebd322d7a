//! HTTP surface: health, chat (SSE) and Excel upload routes
//!
//! The chat route builds the provider per request, so a missing API key is
//! a request-time error instead of a startup failure. Turn progress streams
//! to the client as Server-Sent Events; when the client disconnects the
//! send fails and the turn's interrupt flag is raised.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;

use crate::api::{ApiError, ForecastClient};
use crate::chat::{ChatAgent, TurnCallback, TurnEvent};
use crate::config::{ChatConfig, Config};
use crate::llm::{ClaudeProvider, LlmError, LlmProvider, Message, StreamEvent};
use crate::query::QueryClient;
use crate::tools::ToolRegistry;

type ProviderFactory =
    Arc<dyn Fn() -> Result<Arc<dyn LlmProvider>, LlmError> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    queries: Arc<QueryClient>,
    tools: Arc<ToolRegistry>,
    chat: ChatConfig,
    provider_factory: ProviderFactory,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let api = Arc::new(ForecastClient::new(config.api.base_url.clone()));
        let chat = config.chat.clone();
        let factory_chat = chat.clone();
        Self {
            queries: Arc::new(QueryClient::new(api.clone())),
            tools: Arc::new(ToolRegistry::with_defaults(api)),
            chat,
            provider_factory: Arc::new(move || {
                let provider = ClaudeProvider::from_env()?
                    .with_model(&factory_chat.model)
                    .with_max_tokens(factory_chat.max_tokens);
                Ok(Arc::new(provider) as Arc<dyn LlmProvider>)
            }),
        }
    }

    /// Swap the provider construction. Used by tests to script the model.
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = factory;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/upload", post(upload))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// How often the server re-probes backend health in the background, the
/// dashboard sidebar's polling rate.
const HEALTH_REFRESH_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config);
    let refresher = state.queries.spawn_health_refresh(HEALTH_REFRESH_PERIOD);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    let result = axum::serve(listener, app).await;
    refresher.abort();
    result?;
    Ok(())
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.queries.health().await {
        Ok(health) => Ok(Json(json!({
            "status": health.status,
            "backend": "ok",
        }))),
        Err(err) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({"status": "error", "message": err.to_string()})),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<Value>)> {
    let provider = (state.provider_factory)().map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        )
    })?;

    let mut history = Vec::new();
    for msg in request.messages {
        match msg.role.as_str() {
            "user" => history.push(Message::user(msg.content)),
            "assistant" => history.push(Message::assistant(msg.content)),
            other => {
                tracing::debug!(role = other, "dropping unsupported chat role");
            }
        }
    }
    if history.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "messages must contain at least one user or assistant turn"})),
        ));
    }

    let agent = ChatAgent::new(provider, state.tools.clone())
        .with_max_tool_rounds(state.chat.max_tool_rounds);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Event, Infallible>>();
    let interrupt = Arc::new(AtomicBool::new(false));

    let event_tx = tx.clone();
    let event_interrupt = interrupt.clone();
    let callback: TurnCallback = Arc::new(move |event| {
        if let Some(sse_event) = turn_event_to_sse(&event) {
            if event_tx.send(Ok(sse_event)).is_err() {
                // Client hung up; stop the turn at the next checkpoint.
                event_interrupt.store(true, Ordering::Relaxed);
            }
        }
    });

    tokio::spawn(async move {
        let final_event = match agent.run_turn(&history, callback, interrupt).await {
            Ok(turn) => json_event(
                "done",
                json!({
                    "text": turn.text,
                    "tool_calls_made": turn.tool_calls_made,
                    "interrupted": turn.interrupted,
                    "usage": {
                        "input_tokens": turn.usage.input_tokens,
                        "output_tokens": turn.usage.output_tokens,
                    },
                }),
            ),
            Err(err) => {
                tracing::error!(error = %err, "chat turn failed");
                json_event("error", json!({"message": err.to_string()}))
            }
        };
        if let Some(event) = final_event {
            let _ = tx.send(Ok(event));
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

fn turn_event_to_sse(event: &TurnEvent) -> Option<Event> {
    match event {
        TurnEvent::Stream(StreamEvent::TextDelta(text)) => {
            json_event("text-delta", json!({"text": text}))
        }
        TurnEvent::Stream(StreamEvent::ToolCallStart { id, name }) => {
            json_event("tool-call-start", json!({"id": id, "name": name}))
        }
        TurnEvent::ToolResult { id, name, result } => json_event(
            "tool-result",
            json!({"id": id, "name": name, "result": result}),
        ),
        // Deltas of tool arguments and completion framing stay server-side.
        TurnEvent::Stream(_) => None,
    }
}

fn json_event(name: &str, payload: Value) -> Option<Event> {
    match Event::default().event(name).json_data(&payload) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::error!(error = %err, event = name, "failed to encode SSE event");
            None
        }
    }
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut kind: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": err.to_string()})),
        )
    })? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.xlsx").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"success": false, "message": err.to_string()})),
                    )
                })?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("type") => {
                kind = field.text().await.ok();
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "No se proporcionó archivo"})),
        ));
    };

    let result = if kind.as_deref() == Some("stock") {
        state
            .queries
            .import_stock_excel(&filename, bytes)
            .await
            .and_then(|r| serde_json::to_value(r).map_err(|e| ApiError::Decode(e.to_string())))
    } else {
        state
            .queries
            .upload_sales_excel(&filename, bytes, None)
            .await
            .and_then(|r| serde_json::to_value(r).map_err(|e| ApiError::Decode(e.to_string())))
    };

    match result {
        Ok(value) => Ok((StatusCode::OK, Json(value))),
        Err(ApiError::Status { status, message }) => Err((
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({"success": false, "message": message})),
        )),
        Err(ApiError::InvalidParams(message)) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": message})),
        )),
        Err(err) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({"success": false, "message": err.to_string()})),
        )),
    }
}
