//! petkat: dashboard client and AI assistant for a pet-store sales-forecasting service
//!
//! This library provides:
//! - A typed client for the remote forecasting/inventory backend
//! - A caching, request-coalescing query layer with explicit invalidation
//! - An LLM tool bridge exposing the backend operations to a chat model
//! - A chat agent loop with bounded tool rounds and streaming output
//! - An HTTP server exposing the chat entry points

pub mod api;
pub mod chat;
pub mod config;
pub mod llm;
pub mod query;
pub mod server;
pub mod tools;

pub use api::{ApiError, ForecastClient};
pub use chat::ChatAgent;
pub use config::Config;
pub use query::QueryClient;
pub use tools::{ToolRegistry, ToolResultData};
