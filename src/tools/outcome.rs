//! Tagged tool outcomes
//!
//! Every tool run resolves to a [`ToolResultData`], including failures. The
//! tag travels with the payload so the consumer (the model, or a UI that
//! renders tool results) can dispatch on `type` without guessing from the
//! shape of `data`.

use serde::{Deserialize, Serialize};

use crate::api::types::{
    AvailableEntitiesResponse, DemandByBrandResponse, DemandByCategoryResponse, DemandSummary,
    PredictionResponse, PurchaseOrderResponse, StockAlert, StockItem,
};
use crate::api::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ToolResultData {
    Prediction(PredictionResponse),
    StockAlerts(Vec<StockAlert>),
    DemandSummary(DemandSummary),
    DemandByCategory(DemandByCategoryResponse),
    DemandByBrand(DemandByBrandResponse),
    PurchaseOrder(PurchaseOrderResponse),
    CurrentStock(Vec<StockItem>),
    AvailableEntities(AvailableEntitiesResponse),
    UploadResult(UploadOutcome),
    Error(ToolError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub message: String,
}

impl ToolResultData {
    /// Fold any failure into the error variant, message first. The backend's
    /// own message survives verbatim; decode and validation failures carry
    /// the diagnostic the client attached.
    pub fn from_api_error(err: &ApiError) -> Self {
        Self::Error(ToolError {
            message: err.to_string(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ToolError {
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Prediction(_) => "prediction",
            Self::StockAlerts(_) => "stock_alerts",
            Self::DemandSummary(_) => "demand_summary",
            Self::DemandByCategory(_) => "demand_by_category",
            Self::DemandByBrand(_) => "demand_by_brand",
            Self::PurchaseOrder(_) => "purchase_order",
            Self::CurrentStock(_) => "current_stock",
            Self::AvailableEntities(_) => "available_entities",
            Self::UploadResult(_) => "upload_result",
            Self::Error(_) => "error",
        }
    }
}
