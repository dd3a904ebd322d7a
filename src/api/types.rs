//! Wire shapes for the forecasting backend
//!
//! Every response the client decodes is declared here. Enumerations are
//! closed sets: an unknown `granularity` or alert tier is a decode error,
//! never a silent default. Field names follow the backend JSON (Spanish
//! inventory vocabulary included) so the structs double as documentation
//! of the wire contract.

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ApiError;

// ==================== ENUMS ====================

/// Aggregation level for prediction/demand queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Producto,
    Marca,
    Categoria,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Producto => "producto",
            Granularity::Marca => "marca",
            Granularity::Categoria => "categoria",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric a prediction targets: kilograms sold or sales revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Kilos,
    Ventas,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Kilos => "kilos",
            Target::Ventas => "ventas",
        }
    }
}

/// Stock alert tier, computed upstream from days of coverage.
/// This layer treats it as authoritative and never recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    Agotado,
    Critico,
    Bajo,
    Ok,
}

impl AlertTier {
    /// Tiers that warrant immediate restocking attention.
    pub fn is_critical(&self) -> bool {
        matches!(self, AlertTier::Agotado | AlertTier::Critico)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

// ==================== HEALTH ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub environment: String,
    pub models_loaded: u32,
    pub uptime_seconds: f64,
}

// ==================== PREDICTIONS ====================

/// One forecasted day.
///
/// Canonical shape: both metrics are carried as nullable fields and the
/// envelope's `target` says which one the model actually predicted. The
/// backend's older variant (single value keyed by target) is not accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionItem {
    pub date: NaiveDate,
    pub predicted_kilos: Option<f64>,
    pub predicted_sales: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
}

/// Day-of-week as sent by the backend: either a name or a numeric code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayOfWeek {
    Name(String),
    Index(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub entity: String,
    pub granularity: Granularity,
    pub days: u32,
    pub target: Target,
    pub total: f64,
    pub predictions: Vec<PredictionItem>,
}

impl PredictionResponse {
    /// Structural invariants beyond what serde can express: the sequence
    /// never exceeds the requested horizon, dates ascend, and Sundays are
    /// absent (the store is closed on Sundays).
    pub fn validate(&self, requested_days: u32) -> Result<(), ApiError> {
        if self.predictions.len() > requested_days as usize {
            return Err(ApiError::Validation(format!(
                "{} predictions returned for a {} day horizon",
                self.predictions.len(),
                requested_days
            )));
        }
        let mut prev: Option<NaiveDate> = None;
        for item in &self.predictions {
            if item.date.weekday() == Weekday::Sun {
                return Err(ApiError::Validation(format!(
                    "prediction for {} falls on a Sunday",
                    item.date
                )));
            }
            if let Some(prev) = prev {
                if item.date <= prev {
                    return Err(ApiError::Validation(format!(
                        "prediction dates out of order: {} after {}",
                        item.date, prev
                    )));
                }
            }
            prev = Some(item.date);
        }
        Ok(())
    }
}

// ==================== AVAILABLE ENTITIES ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableEntity {
    pub entity: String,
    pub num_days: u32,
    pub total_kilos: f64,
    pub total_sales: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableEntitiesResponse {
    pub granularity: Granularity,
    pub count: usize,
    pub entities: Vec<AvailableEntity>,
}

// ==================== DEMAND ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDemand {
    pub categoria: String,
    pub demanda_total_kg: f64,
    pub demanda_promedio_diaria_kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ventas_proyectadas: Option<f64>,
    #[serde(default)]
    pub historico_total_kg: f64,
    #[serde(default)]
    pub historico_dias: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandDemand {
    pub marca: String,
    pub demanda_total_kg: f64,
    pub demanda_promedio_diaria_kg: f64,
    #[serde(default)]
    pub historico_total_kg: f64,
    #[serde(default)]
    pub historico_ventas: f64,
}

/// Aggregated demand over a trailing period, split by category and brand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSummary {
    pub periodo_dias: u32,
    pub categorias: Vec<CategoryDemand>,
    pub marcas: Vec<BrandDemand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandByCategoryResponse {
    pub periodo_dias: u32,
    pub categorias: Vec<CategoryDemand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandByBrandResponse {
    pub periodo_dias: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    pub marcas: Vec<BrandDemand>,
}

// ==================== STOCK ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAlert {
    pub producto: String,
    pub categoria: String,
    pub tipo_alerta: AlertTier,
    pub stock_actual_kg: f64,
    pub demanda_proyectada_kg: f64,
    pub dias_cobertura: f64,
    #[serde(
        default,
        alias = "cantidad_sugerida_reposicion_kg",
        skip_serializing_if = "Option::is_none"
    )]
    pub cantidad_sugerida_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proveedor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
}

/// Current inventory row; `producto` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub producto: String,
    pub categoria: String,
    pub cantidad_kg: f64,
    #[serde(default)]
    pub cantidad_unidades: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_costo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_venta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proveedor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_minimo_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_minimo_unidades: Option<f64>,
    pub ultima_actualizacion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItemCreate {
    pub producto: String,
    pub categoria: String,
    pub cantidad_kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cantidad_unidades: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_costo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_venta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proveedor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_minimo_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_minimo_unidades: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cantidad_kg_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cantidad_unidades_delta: Option<f64>,
    pub motivo: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertCounts {
    pub agotados: u32,
    pub criticos: u32,
    pub bajos: u32,
    pub ok: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSummaryResponse {
    pub total_productos: u32,
    pub total_categorias: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor_inventario_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertas: Option<AlertCounts>,
}

// ==================== PURCHASE ORDER ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub producto: String,
    pub categoria: String,
    pub cantidad_sugerida_kg: f64,
    pub stock_actual_kg: f64,
    pub demanda_proyectada_kg: f64,
    pub dias_cobertura: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proveedor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_estimado: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderResponse {
    pub fecha_generacion: String,
    pub items: Vec<PurchaseOrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costo_estimado_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agrupado_por_proveedor: Option<HashMap<String, Vec<PurchaseOrderItem>>>,
}

// ==================== STOCK COVERAGE ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageState {
    Ok,
    Bajo,
    Critico,
    SinPrediccion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageDetail {
    pub producto: String,
    pub categoria: String,
    pub stock_actual_kg: f64,
    pub demanda_proyectada_kg: Option<f64>,
    pub demanda_diaria_kg: Option<f64>,
    pub dias_cobertura: Option<f64>,
    pub estado: CoverageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCoverageAnalysis {
    pub periodo_dias: u32,
    pub total_productos: u32,
    pub productos_criticos: u32,
    pub productos_bajos: u32,
    pub productos_ok: u32,
    pub detalle: Vec<CoverageDetail>,
}

// ==================== DATA ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStatsResponse {
    pub total_records: u64,
    pub date_range_start: String,
    pub date_range_end: String,
    pub total_days: u32,
    pub business_days: u32,
    pub total_sales: f64,
    pub average_daily_sales: f64,
    pub products_count: u32,
    pub categories_count: u32,
}

/// Raw sales ledger row; field casing follows the source spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "Producto")]
    pub producto: String,
    #[serde(rename = "Detalle")]
    pub detalle: String,
    #[serde(rename = "Kilos")]
    pub kilos: String,
    #[serde(rename = "Kilos_num")]
    pub kilos_num: f64,
    #[serde(rename = "Contado")]
    pub contado: f64,
    #[serde(rename = "Tarjeta_Laura")]
    pub tarjeta_laura: f64,
    #[serde(rename = "Tarjeta_Jorge")]
    pub tarjeta_jorge: f64,
    #[serde(rename = "Venta_Total")]
    pub venta_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalDataResponse {
    pub count: usize,
    pub data: Vec<HistoricalRecord>,
}

// ==================== MODELS ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub r2_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_key: String,
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ModelMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPerformanceRow {
    pub model_id: String,
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mape: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestModel {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mape: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_mape: Option<BestModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_r2: Option<BestModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPerformanceComparison {
    pub models: Vec<ModelPerformanceRow>,
    #[serde(default)]
    pub summary: PerformanceSummary,
}

// ==================== UPLOADS ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPeriod {
    pub start: String,
    pub end: String,
    pub unique_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub records_processed: u64,
    pub records_added: u64,
    pub duplicates_removed: u64,
    pub total_records: u64,
    pub data_period: DataPeriod,
    pub model_retrained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_metrics: Option<ModelMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockImportStats {
    pub imported: u32,
    pub errors: u32,
    #[serde(default)]
    pub error_details: Vec<String>,
    pub total_products: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockImportResponse {
    pub success: bool,
    pub message: String,
    pub data: StockImportStats,
}

// ==================== MISC ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}
