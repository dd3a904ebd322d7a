//! HTTP client for the forecasting backend
//!
//! Every method issues exactly one attempt: no retries, no timeout. That is
//! a deliberate simplicity choice for read-mostly dashboard traffic; callers
//! that need a deadline wrap the future themselves. Responses are decoded
//! and structurally validated before they reach application code.

#![allow(dead_code)]

use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::types::*;
use super::ApiError;

pub struct ForecastClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ForecastClient {
    /// Build a client against the given backend origin. The URL comes from
    /// validated configuration; there is no process-wide singleton.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ==================== HEALTH ====================

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let url = self.endpoint(&["health"])?;
        self.get_json(url).await
    }

    // ==================== PREDICTIONS ====================

    /// Predict by brand or category. Product-level predictions go through
    /// [`predict_product`](Self::predict_product); a product name is
    /// meaningless at any other granularity and vice versa.
    pub async fn predict(
        &self,
        granularity: Granularity,
        name: &str,
        days: u32,
        target: Target,
    ) -> Result<PredictionResponse, ApiError> {
        if granularity == Granularity::Producto {
            return Err(ApiError::InvalidParams(
                "use predict_product for producto granularity".to_string(),
            ));
        }
        self.predict_inner(granularity, name, days, target).await
    }

    pub async fn predict_product(
        &self,
        name: &str,
        days: u32,
        target: Target,
    ) -> Result<PredictionResponse, ApiError> {
        self.predict_inner(Granularity::Producto, name, days, target)
            .await
    }

    async fn predict_inner(
        &self,
        granularity: Granularity,
        name: &str,
        days: u32,
        target: Target,
    ) -> Result<PredictionResponse, ApiError> {
        ensure_positive(days, "days")?;
        ensure_non_empty(name, "name")?;
        let mut url = self.endpoint(&["api", "v1", "products", "predict", granularity.as_str(), name])?;
        url.query_pairs_mut()
            .append_pair("days", &days.to_string())
            .append_pair("target", target.as_str());
        let response: PredictionResponse = self.get_json(url).await?;
        response.validate(days)?;
        Ok(response)
    }

    pub async fn available_entities(
        &self,
        granularity: Granularity,
    ) -> Result<AvailableEntitiesResponse, ApiError> {
        let url = self.endpoint(&["api", "v1", "products", "available", granularity.as_str()])?;
        self.get_json(url).await
    }

    // ==================== DEMAND ====================

    pub async fn demand_summary(&self, days: u32) -> Result<DemandSummary, ApiError> {
        ensure_positive(days, "days")?;
        let mut url = self.endpoint(&["api", "v1", "products", "demand", "summary"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn demand_by_category(&self, days: u32) -> Result<DemandByCategoryResponse, ApiError> {
        ensure_positive(days, "days")?;
        let mut url = self.endpoint(&["api", "v1", "products", "demand", "by-category"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn demand_by_brand(
        &self,
        days: u32,
        top: u32,
    ) -> Result<DemandByBrandResponse, ApiError> {
        ensure_positive(days, "days")?;
        ensure_positive(top, "top")?;
        let mut url = self.endpoint(&["api", "v1", "products", "demand", "by-brand"])?;
        url.query_pairs_mut()
            .append_pair("days", &days.to_string())
            .append_pair("top", &top.to_string());
        self.get_json(url).await
    }

    // ==================== STOCK ====================

    pub async fn current_stock(&self) -> Result<Vec<StockItem>, ApiError> {
        // Backend expects the trailing slash on the collection route.
        let url = self.endpoint(&["api", "v1", "stock", ""])?;
        self.get_json(url).await
    }

    pub async fn stock_item(&self, producto: &str) -> Result<StockItem, ApiError> {
        ensure_non_empty(producto, "producto")?;
        let url = self.endpoint(&["api", "v1", "stock", producto])?;
        self.get_json(url).await
    }

    pub async fn stock_summary(&self) -> Result<StockSummaryResponse, ApiError> {
        let url = self.endpoint(&["api", "v1", "stock", "summary"])?;
        self.get_json(url).await
    }

    pub async fn stock_alerts(&self, days: u32) -> Result<Vec<StockAlert>, ApiError> {
        ensure_positive(days, "days")?;
        let mut url = self.endpoint(&["api", "v1", "stock", "alerts", "all"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn stock_coverage(&self, days: u32) -> Result<StockCoverageAnalysis, ApiError> {
        ensure_positive(days, "days")?;
        let mut url = self.endpoint(&["api", "v1", "stock", "coverage"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn purchase_order(&self, days: u32) -> Result<PurchaseOrderResponse, ApiError> {
        ensure_positive(days, "days")?;
        let mut url = self.endpoint(&["api", "v1", "stock", "purchase-order"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn create_stock_item(&self, item: &StockItemCreate) -> Result<StockItem, ApiError> {
        ensure_non_empty(&item.producto, "producto")?;
        let url = self.endpoint(&["api", "v1", "stock", ""])?;
        self.post_json(url, item).await
    }

    pub async fn adjust_stock(
        &self,
        producto: &str,
        request: &StockAdjustRequest,
    ) -> Result<StockItem, ApiError> {
        ensure_non_empty(producto, "producto")?;
        if request.cantidad_kg_delta.is_none() && request.cantidad_unidades_delta.is_none() {
            return Err(ApiError::InvalidParams(
                "adjustment needs at least one delta".to_string(),
            ));
        }
        let url = self.endpoint(&["api", "v1", "stock", producto, "adjust"])?;
        self.post_json(url, request).await
    }

    pub async fn delete_stock_item(&self, producto: &str) -> Result<SuccessResponse, ApiError> {
        ensure_non_empty(producto, "producto")?;
        let url = self.endpoint(&["api", "v1", "stock", producto])?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(ApiError::from_network)?;
        self.decode(response).await
    }

    // ==================== DATA ====================

    pub async fn data_stats(&self) -> Result<DataStatsResponse, ApiError> {
        let url = self.endpoint(&["api", "v1", "data", "stats"])?;
        self.get_json(url).await
    }

    pub async fn historical_data(&self, limit: Option<u32>) -> Result<HistoricalDataResponse, ApiError> {
        let mut url = self.endpoint(&["api", "v1", "data", "historical"])?;
        if let Some(limit) = limit {
            ensure_positive(limit, "limit")?;
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }
        self.get_json(url).await
    }

    // ==================== MODELS ====================

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let url = self.endpoint(&["api", "v1", "models", ""])?;
        self.get_json(url).await
    }

    pub async fn model_performance(&self) -> Result<ModelPerformanceComparison, ApiError> {
        let url = self.endpoint(&["api", "v1", "models", "performance"])?;
        self.get_json(url).await
    }

    // ==================== UPLOADS ====================

    /// Upload a sales-history spreadsheet. When `retrain` asks for
    /// background retraining the backend answers as soon as the import is
    /// done; this method never waits for training to finish.
    pub async fn upload_sales_excel(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        retrain: Option<bool>,
    ) -> Result<UploadResponse, ApiError> {
        ensure_excel_filename(filename)?;
        let mut url = self.endpoint(&["api", "v1", "upload", "excel"])?;
        if let Some(retrain) = retrain {
            url.query_pairs_mut()
                .append_pair("retrain", if retrain { "true" } else { "false" });
        }
        self.post_file(url, filename, bytes).await
    }

    /// Import an inventory spreadsheet into the stock table.
    pub async fn import_stock_excel(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StockImportResponse, ApiError> {
        ensure_excel_filename(filename)?;
        let url = self.endpoint(&["api", "v1", "stock", "import", "excel"])?;
        self.post_file(url, filename, bytes).await
    }

    // ==================== PLUMBING ====================

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidParams("base URL cannot carry a path".to_string())
            })?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ApiError::from_network)?;
        self.decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_network)?;
        self.decode(response).await
    }

    async fn post_file<T: DeserializeOwned>(
        &self,
        url: Url,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<T, ApiError> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from_network)?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_network)?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn ensure_positive(value: u32, name: &str) -> Result<(), ApiError> {
    if value == 0 {
        return Err(ApiError::InvalidParams(format!("{name} must be positive")));
    }
    Ok(())
}

fn ensure_non_empty(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidParams(format!("{name} must not be empty")));
    }
    Ok(())
}

fn ensure_excel_filename(filename: &str) -> Result<(), ApiError> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        Ok(())
    } else {
        Err(ApiError::InvalidParams(format!(
            "expected an .xlsx/.xls file, got {filename}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn spawn_backend(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    fn health_body() -> Value {
        json!({
            "status": "healthy",
            "version": "1.4.2",
            "environment": "test",
            "models_loaded": 12,
            "uptime_seconds": 512.5
        })
    }

    #[tokio::test]
    async fn health_round_trip() {
        let router = Router::new().route("/health", get(|| async { Json(health_body()) }));
        let client = ForecastClient::new(spawn_backend(router).await);
        let health = client.health().await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.models_loaded, 12);
    }

    #[tokio::test]
    async fn backend_error_message_surfaced_verbatim() {
        let router = Router::new().route(
            "/health",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "db down"})),
                )
            }),
        );
        let client = ForecastClient::new(spawn_backend(router).await);
        let err = client.health().await.unwrap_err();
        assert_eq!(err.to_string(), "db down");
        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn wrong_shape_is_decode_not_status() {
        let router = Router::new().route("/health", get(|| async { Json(json!({"nope": 1})) }));
        let client = ForecastClient::new(spawn_backend(router).await);
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(err.is_malformed_response());
    }

    #[tokio::test]
    async fn unknown_alert_tier_is_decode_error() {
        let router = Router::new().route(
            "/api/v1/stock/alerts/all",
            get(|| async {
                Json(json!([{
                    "producto": "Purina 20kg",
                    "categoria": "Alimento",
                    "tipo_alerta": "urgente",
                    "stock_actual_kg": 2,
                    "demanda_proyectada_kg": 40,
                    "dias_cobertura": 1.5
                }]))
            }),
        );
        let client = ForecastClient::new(spawn_backend(router).await);
        let err = client.stock_alerts(30).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn predict_rejects_bad_params_before_io() {
        // Unroutable base URL: any network attempt would fail differently.
        let client = ForecastClient::new(Url::parse("http://127.0.0.1:1").unwrap());

        let err = client
            .predict_product("Purina 20kg", 0, Target::Kilos)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));

        let err = client.predict(Granularity::Marca, "  ", 30, Target::Kilos).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));

        let err = client
            .predict(Granularity::Producto, "Purina 20kg", 30, Target::Kilos)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn predict_encodes_entity_name_and_validates_response() {
        async fn handler(
            Path(name): Path<String>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            assert_eq!(name, "Pro Plan 15kg");
            assert_eq!(params["days"], "30");
            assert_eq!(params["target"], "kilos");
            Json(json!({
                "entity": name,
                "granularity": "marca",
                "days": 30,
                "target": "kilos",
                "total": 21.5,
                "predictions": [
                    {"date": "2025-03-03", "predicted_kilos": 10.5, "predicted_sales": null, "day_of_week": "Monday"},
                    {"date": "2025-03-04", "predicted_kilos": 11.0, "predicted_sales": null, "day_of_week": 1}
                ]
            }))
        }
        let router = Router::new().route("/api/v1/products/predict/marca/:name", get(handler));
        let client = ForecastClient::new(spawn_backend(router).await);
        let response = client
            .predict(Granularity::Marca, "Pro Plan 15kg", 30, Target::Kilos)
            .await
            .unwrap();
        assert_eq!(response.predictions.len(), 2);
        assert_eq!(response.total, 21.5);
    }

    #[tokio::test]
    async fn predict_rejects_sunday_in_response() {
        let router = Router::new().route(
            "/api/v1/products/predict/categoria/:name",
            get(|| async {
                Json(json!({
                    "entity": "Alimento",
                    "granularity": "categoria",
                    "days": 30,
                    "target": "kilos",
                    "total": 5.0,
                    // 2025-03-09 is a Sunday
                    "predictions": [
                        {"date": "2025-03-09", "predicted_kilos": 5.0, "predicted_sales": null}
                    ]
                }))
            }),
        );
        let client = ForecastClient::new(spawn_backend(router).await);
        let err = client
            .predict(Granularity::Categoria, "Alimento", 30, Target::Kilos)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn available_entities_empty_result_is_ok() {
        let router = Router::new().route(
            "/api/v1/products/available/marca",
            get(|| async { Json(json!({"granularity": "marca", "count": 0, "entities": []})) }),
        );
        let client = ForecastClient::new(spawn_backend(router).await);
        let response = client.available_entities(Granularity::Marca).await.unwrap();
        assert_eq!(response.count, 0);
        assert_eq!(response.entities.len(), 0);
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_and_retrain_flag() {
        async fn handler(
            Query(params): Query<HashMap<String, String>>,
            mut multipart: Multipart,
        ) -> Json<Value> {
            assert_eq!(params.get("retrain").map(String::as_str), Some("true"));
            let field = multipart.next_field().await.unwrap().unwrap();
            assert_eq!(field.name(), Some("file"));
            assert_eq!(field.file_name(), Some("ventas.xlsx"));
            let bytes = field.bytes().await.unwrap();
            assert_eq!(&bytes[..], b"fake sheet");
            Json(json!({
                "success": true,
                "message": "importado",
                "filename": "ventas.xlsx",
                "records_processed": 120,
                "records_added": 100,
                "duplicates_removed": 20,
                "total_records": 5000,
                "data_period": {"start": "2024-01-02", "end": "2025-02-28", "unique_days": 350},
                "model_retrained": true
            }))
        }
        let router = Router::new().route("/api/v1/upload/excel", post(handler));
        let client = ForecastClient::new(spawn_backend(router).await);
        let response = client
            .upload_sales_excel("ventas.xlsx", b"fake sheet".to_vec(), Some(true))
            .await
            .unwrap();
        assert!(response.success);
        assert!(response.model_retrained);
    }

    #[tokio::test]
    async fn upload_rejects_non_excel_files() {
        let client = ForecastClient::new(Url::parse("http://127.0.0.1:1").unwrap());
        let err = client
            .upload_sales_excel("ventas.csv", Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn adjust_requires_a_delta() {
        let client = ForecastClient::new(Url::parse("http://127.0.0.1:1").unwrap());
        let request = StockAdjustRequest {
            cantidad_kg_delta: None,
            cantidad_unidades_delta: None,
            motivo: "ajuste".to_string(),
        };
        let err = client.adjust_stock("Purina 20kg", &request).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let client = ForecastClient::new(Url::parse("http://127.0.0.1:1").unwrap());
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(!err.is_malformed_response());
    }
}
