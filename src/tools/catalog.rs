//! The ten read-only tools the assistant works with
//!
//! Descriptions are in Spanish because the assistant speaks Spanish to the
//! store staff; argument defaults (30-day horizon, kilos, top 20 brands)
//! match the dashboard's.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{days_property, Tool, ToolResultData};
use crate::api::types::{Granularity, Target};
use crate::api::{ApiError, ForecastClient};

fn default_days() -> u32 {
    30
}

fn default_target() -> Target {
    Target::Kilos
}

fn default_top() -> u32 {
    20
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ApiError> {
    serde_json::from_value(args).map_err(|e| ApiError::InvalidParams(e.to_string()))
}

#[derive(Deserialize)]
struct DaysArgs {
    #[serde(default = "default_days")]
    days: u32,
}

#[derive(Deserialize)]
struct PredictArgs {
    name: String,
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default = "default_target")]
    target: Target,
}

// ==================== STOCK ====================

pub struct GetStockAlertsTool {
    api: Arc<ForecastClient>,
}

impl GetStockAlertsTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetStockAlertsTool {
    fn name(&self) -> &str {
        "get_stock_alerts"
    }

    fn description(&self) -> &str {
        "Obtiene las alertas de stock (inventario). Muestra qué productos están agotados, \
         en nivel crítico, bajo u ok. Usa esto cuando pregunten sobre inventario, stock, \
         alertas o productos que se están agotando."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": {
                    "type": "integer",
                    "description": "Días de proyección para calcular alertas (por defecto 30)",
                    "minimum": 1
                }
            }
        })
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: DaysArgs = parse_args(args)?;
        let alerts = self.api.stock_alerts(args.days).await?;
        Ok(ToolResultData::StockAlerts(alerts))
    }
}

pub struct GetCurrentStockTool {
    api: Arc<ForecastClient>,
}

impl GetCurrentStockTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCurrentStockTool {
    fn name(&self) -> &str {
        "get_current_stock"
    }

    fn description(&self) -> &str {
        "Obtiene el inventario actual completo con cantidades, categorías y proveedores \
         de todos los productos."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        // Tolerate a null argument object; some models send nothing at all.
        if !args.is_null() && !args.is_object() {
            return Err(ApiError::InvalidParams(
                "expected an object of arguments".to_string(),
            ));
        }
        let stock = self.api.current_stock().await?;
        Ok(ToolResultData::CurrentStock(stock))
    }
}

pub struct GetPurchaseOrderTool {
    api: Arc<ForecastClient>,
}

impl GetPurchaseOrderTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetPurchaseOrderTool {
    fn name(&self) -> &str {
        "get_purchase_order"
    }

    fn description(&self) -> &str {
        "Genera una orden de compra sugerida basada en las proyecciones de demanda y el \
         stock actual. Usa esto cuando pregunten qué comprar o reabastecer."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": {
                    "type": "integer",
                    "description": "Período de días para proyectar (por defecto 30)",
                    "minimum": 1
                }
            }
        })
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: DaysArgs = parse_args(args)?;
        let order = self.api.purchase_order(args.days).await?;
        Ok(ToolResultData::PurchaseOrder(order))
    }
}

// ==================== PREDICTIONS ====================

pub struct PredictProductTool {
    api: Arc<ForecastClient>,
}

impl PredictProductTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for PredictProductTool {
    fn name(&self) -> &str {
        "predict_product"
    }

    fn description(&self) -> &str {
        "Predice ventas futuras de un producto específico usando el modelo ML. Usa esto \
         cuando pregunten sobre predicciones o pronósticos de un producto en particular."
    }

    fn parameters(&self) -> Value {
        prediction_schema("Nombre exacto del producto")
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: PredictArgs = parse_args(args)?;
        let prediction = self
            .api
            .predict_product(&args.name, args.days, args.target)
            .await?;
        Ok(ToolResultData::Prediction(prediction))
    }
}

pub struct PredictCategoryTool {
    api: Arc<ForecastClient>,
}

impl PredictCategoryTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for PredictCategoryTool {
    fn name(&self) -> &str {
        "predict_category"
    }

    fn description(&self) -> &str {
        "Predice ventas futuras de una categoría completa (Alimento, Varios, Higiene, \
         Juguete, Collar, Ropa, Cama, Baño, Comedero). Usa esto cuando pregunten sobre \
         predicciones de una categoría."
    }

    fn parameters(&self) -> Value {
        prediction_schema("Nombre de la categoría")
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: PredictArgs = parse_args(args)?;
        let prediction = self
            .api
            .predict(Granularity::Categoria, &args.name, args.days, args.target)
            .await?;
        Ok(ToolResultData::Prediction(prediction))
    }
}

pub struct PredictBrandTool {
    api: Arc<ForecastClient>,
}

impl PredictBrandTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for PredictBrandTool {
    fn name(&self) -> &str {
        "predict_brand"
    }

    fn description(&self) -> &str {
        "Predice ventas futuras de una marca específica. Usa esto cuando pregunten sobre \
         predicciones de una marca."
    }

    fn parameters(&self) -> Value {
        prediction_schema("Nombre de la marca")
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: PredictArgs = parse_args(args)?;
        let prediction = self
            .api
            .predict(Granularity::Marca, &args.name, args.days, args.target)
            .await?;
        Ok(ToolResultData::Prediction(prediction))
    }
}

fn prediction_schema(name_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": name_description},
            "days": {
                "type": "integer",
                "description": "Días a predecir (por defecto 30)",
                "minimum": 1
            },
            "target": {
                "type": "string",
                "enum": ["kilos", "ventas"],
                "description": "Si predecir kilos o ventas en dólares (por defecto kilos)"
            }
        },
        "required": ["name"]
    })
}

// ==================== DEMAND ====================

pub struct GetDemandSummaryTool {
    api: Arc<ForecastClient>,
}

impl GetDemandSummaryTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetDemandSummaryTool {
    fn name(&self) -> &str {
        "get_demand_summary"
    }

    fn description(&self) -> &str {
        "Obtiene un resumen general de la demanda proyectada: categorías y marcas \
         principales con sus totales en kg. Usa esto para dar una visión general del negocio."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"days": days_property()}})
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: DaysArgs = parse_args(args)?;
        let summary = self.api.demand_summary(args.days).await?;
        Ok(ToolResultData::DemandSummary(summary))
    }
}

pub struct GetDemandByCategoryTool {
    api: Arc<ForecastClient>,
}

impl GetDemandByCategoryTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetDemandByCategoryTool {
    fn name(&self) -> &str {
        "get_demand_by_category"
    }

    fn description(&self) -> &str {
        "Obtiene la demanda desglosada por categoría. Muestra cuántos kg se proyectan por \
         cada categoría de productos."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"days": days_property()}})
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: DaysArgs = parse_args(args)?;
        let demand = self.api.demand_by_category(args.days).await?;
        Ok(ToolResultData::DemandByCategory(demand))
    }
}

pub struct GetDemandByBrandTool {
    api: Arc<ForecastClient>,
}

impl GetDemandByBrandTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[derive(Deserialize)]
struct DemandByBrandArgs {
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default = "default_top")]
    top: u32,
}

#[async_trait]
impl Tool for GetDemandByBrandTool {
    fn name(&self) -> &str {
        "get_demand_by_brand"
    }

    fn description(&self) -> &str {
        "Obtiene la demanda desglosada por marca. Muestra el ranking de marcas más vendidas."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": days_property(),
                "top": {
                    "type": "integer",
                    "description": "Cantidad de marcas top a mostrar (por defecto 20)",
                    "minimum": 1
                }
            }
        })
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: DemandByBrandArgs = parse_args(args)?;
        let demand = self.api.demand_by_brand(args.days, args.top).await?;
        Ok(ToolResultData::DemandByBrand(demand))
    }
}

// ==================== DISCOVERY ====================

pub struct GetAvailableProductsTool {
    api: Arc<ForecastClient>,
}

impl GetAvailableProductsTool {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self { api }
    }
}

#[derive(Deserialize)]
struct AvailableArgs {
    granularity: Granularity,
}

#[async_trait]
impl Tool for GetAvailableProductsTool {
    fn name(&self) -> &str {
        "get_available_products"
    }

    fn description(&self) -> &str {
        "Lista las entidades disponibles (productos, marcas o categorías) que tienen datos \
         para hacer predicciones. Usa esto antes de predecir si no sabes el nombre exacto."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "granularity": {
                    "type": "string",
                    "enum": ["producto", "marca", "categoria"],
                    "description": "Tipo de entidad: producto, marca o categoria"
                }
            },
            "required": ["granularity"]
        })
    }

    async fn call(&self, args: Value) -> Result<ToolResultData, ApiError> {
        let args: AvailableArgs = parse_args(args)?;
        let entities = self.api.available_entities(args.granularity).await?;
        Ok(ToolResultData::AvailableEntities(entities))
    }
}
