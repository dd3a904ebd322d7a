//! Tools the chat model can call against the forecasting backend
//!
//! Each tool wraps one read endpoint of the API client and resolves to a
//! tagged [`ToolResultData`]. Execution never raises: unknown tools, bad
//! arguments and backend failures all come back as the `error` variant so
//! the conversation can continue with the model seeing what went wrong.

mod catalog;
mod outcome;

pub use catalog::{
    GetAvailableProductsTool, GetCurrentStockTool, GetDemandByBrandTool, GetDemandByCategoryTool,
    GetDemandSummaryTool, GetPurchaseOrderTool, GetStockAlertsTool, PredictBrandTool,
    PredictCategoryTool, PredictProductTool,
};
pub use outcome::{ToolError, ToolResultData, UploadOutcome};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{ApiError, ForecastClient};
use crate::llm::ToolDefinition;

/// A callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable tool name, as advertised to the model.
    fn name(&self) -> &str;

    /// Description shown to the model when deciding whether to call.
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. Backend failures surface as `Err`; the registry folds
    /// them into [`ToolResultData::Error`] before they reach the model.
    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Name-indexed tool set handed to the chat loop.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The full catalog the assistant works with.
    pub fn with_defaults(api: Arc<ForecastClient>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetStockAlertsTool::new(api.clone())));
        registry.register(Arc::new(PredictProductTool::new(api.clone())));
        registry.register(Arc::new(PredictCategoryTool::new(api.clone())));
        registry.register(Arc::new(PredictBrandTool::new(api.clone())));
        registry.register(Arc::new(GetDemandSummaryTool::new(api.clone())));
        registry.register(Arc::new(GetDemandByCategoryTool::new(api.clone())));
        registry.register(Arc::new(GetDemandByBrandTool::new(api.clone())));
        registry.register(Arc::new(GetPurchaseOrderTool::new(api.clone())));
        registry.register(Arc::new(GetCurrentStockTool::new(api.clone())));
        registry.register(Arc::new(GetAvailableProductsTool::new(api)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for the provider request, sorted by name so the
    /// advertised order is stable across runs.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute by name. Infallible: every failure mode becomes the tagged
    /// error outcome, and the caller feeds it back to the model as a
    /// regular tool result.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResultData {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = name, "model requested an unknown tool");
            return ToolResultData::error(format!("unknown tool: {name}"));
        };

        tracing::debug!(tool = name, ?args, "executing tool");
        match tool.call(args).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "tool execution failed");
                ToolResultData::from_api_error(&err)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared schema fragment for the forecast-horizon argument.
pub(crate) fn days_property() -> Value {
    json!({
        "type": "integer",
        "description": "Días a proyectar (por defecto 30)",
        "minimum": 1
    })
}
