//! Typed access to the forecasting/inventory backend
//!
//! `types` declares the wire shapes (with closed enums and structural
//! validation), `client` wraps the HTTP calls, `error` normalizes failures.

mod client;
mod error;
pub mod types;

pub use client::ForecastClient;
pub use error::ApiError;
