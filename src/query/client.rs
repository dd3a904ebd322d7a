//! Typed query and mutation units over the cache
//!
//! Staleness policy mirrors the dashboard's: health is near-live, prediction
//! and stock reads stay fresh for five minutes, aggregates for ten, the
//! model list for thirty. Mutations invalidate through an explicit prefix
//! table kept next to the mutation methods.

#![allow(dead_code)]

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::cache::{QueryCache, QueryResult};
use super::key::keys;
use crate::api::types::*;
use crate::api::{ApiError, ForecastClient};

const HEALTH_TTL: Duration = Duration::from_secs(30);
const PREDICTION_TTL: Duration = Duration::from_secs(5 * 60);
const STOCK_TTL: Duration = Duration::from_secs(5 * 60);
const AGGREGATE_TTL: Duration = Duration::from_secs(10 * 60);
const MODELS_TTL: Duration = Duration::from_secs(30 * 60);

/// Mutations this layer can issue; each maps to the cache-key prefixes it
/// can affect (see [`invalidation_prefixes`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    UploadSalesExcel,
    ImportStockExcel,
    CreateStockItem,
    AdjustStock,
    DeleteStockItem,
}

/// Explicit invalidation table. Kept colocated with the mutation methods so
/// the table and the endpoint set cannot drift apart silently.
fn invalidation_prefixes(kind: MutationKind) -> &'static [&'static [&'static str]] {
    match kind {
        // New sales history reshapes stats, every prediction, the trained
        // models and the demand aggregates derived from sales.
        MutationKind::UploadSalesExcel => &[
            &["dataStats"],
            &["historical"],
            &["predictions"],
            &["models"],
            &["demandSummary"],
            &["demandByCategory"],
            &["demandByBrand"],
        ],
        // All stock reads (item, list, alerts, coverage, purchase order)
        // live under the shared prefix.
        MutationKind::ImportStockExcel
        | MutationKind::CreateStockItem
        | MutationKind::AdjustStock
        | MutationKind::DeleteStockItem => &[&["stock"]],
    }
}

/// Client-side composition of the stock list and the alert list, the way
/// the dashboard's summary card counts them. Not a network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockOverview {
    pub total_productos: usize,
    pub criticos: usize,
    pub bajos: usize,
    pub ok: usize,
}

pub struct QueryClient {
    api: Arc<ForecastClient>,
    cache: QueryCache,
}

impl QueryClient {
    pub fn new(api: Arc<ForecastClient>) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
        }
    }

    pub fn api(&self) -> &Arc<ForecastClient> {
        &self.api
    }

    // ==================== QUERIES ====================

    pub async fn health(&self) -> QueryResult<HealthResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::health(), HEALTH_TTL, move || async move {
                api.health().await
            })
            .await
    }

    /// Background health polling, the dashboard's sidebar behavior: drop the
    /// cached entry and refetch every `period` so `health()` answers from a
    /// recent probe even with no traffic. Aborts when the handle is dropped
    /// by the caller or the task is aborted.
    pub fn spawn_health_refresh(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let queries = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it, callers already
            // fetch on demand.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                queries.cache.invalidate_prefix(&["health"]);
                if let Err(err) = queries.health().await {
                    tracing::debug!(error = %err, "health refresh failed");
                }
            }
        })
    }

    /// Product-granularity requests route through the dedicated endpoint;
    /// everything shares one key space so identical lookups coalesce.
    pub async fn predict(
        &self,
        granularity: Granularity,
        name: &str,
        days: u32,
        target: Target,
    ) -> QueryResult<PredictionResponse> {
        let api = self.api.clone();
        let name_owned = name.to_string();
        self.cache
            .get_or_fetch(
                keys::prediction(granularity, name, days, target),
                PREDICTION_TTL,
                move || async move {
                    match granularity {
                        Granularity::Producto => {
                            api.predict_product(&name_owned, days, target).await
                        }
                        _ => api.predict(granularity, &name_owned, days, target).await,
                    }
                },
            )
            .await
    }

    pub async fn demand_summary(&self, days: u32) -> QueryResult<DemandSummary> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::demand_summary(days), AGGREGATE_TTL, move || async move {
                api.demand_summary(days).await
            })
            .await
    }

    pub async fn demand_by_category(&self, days: u32) -> QueryResult<DemandByCategoryResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(
                keys::demand_by_category(days),
                AGGREGATE_TTL,
                move || async move { api.demand_by_category(days).await },
            )
            .await
    }

    pub async fn demand_by_brand(&self, days: u32, top: u32) -> QueryResult<DemandByBrandResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(
                keys::demand_by_brand(days, top),
                AGGREGATE_TTL,
                move || async move { api.demand_by_brand(days, top).await },
            )
            .await
    }

    pub async fn current_stock(&self) -> QueryResult<Vec<StockItem>> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::stock_all(), STOCK_TTL, move || async move {
                api.current_stock().await
            })
            .await
    }

    pub async fn stock_item(&self, producto: &str) -> QueryResult<StockItem> {
        let api = self.api.clone();
        let producto_owned = producto.to_string();
        self.cache
            .get_or_fetch(keys::stock_item(producto), STOCK_TTL, move || async move {
                api.stock_item(&producto_owned).await
            })
            .await
    }

    pub async fn stock_summary(&self) -> QueryResult<StockSummaryResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::stock_summary(), STOCK_TTL, move || async move {
                api.stock_summary().await
            })
            .await
    }

    pub async fn stock_alerts(&self, days: u32) -> QueryResult<Vec<StockAlert>> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::stock_alerts(days), STOCK_TTL, move || async move {
                api.stock_alerts(days).await
            })
            .await
    }

    /// Alerts filtered to the tiers that need action. Pure filter over the
    /// cached alert list, never a separate network call.
    pub async fn critical_stock_alerts(&self, days: u32) -> Result<Vec<StockAlert>, Arc<ApiError>> {
        let alerts = self.stock_alerts(days).await?;
        Ok(alerts
            .iter()
            .filter(|a| a.tipo_alerta.is_critical())
            .cloned()
            .collect())
    }

    pub async fn stock_coverage(&self, days: u32) -> QueryResult<StockCoverageAnalysis> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::stock_coverage(days), STOCK_TTL, move || async move {
                api.stock_coverage(days).await
            })
            .await
    }

    pub async fn purchase_order(&self, days: u32) -> QueryResult<PurchaseOrderResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::purchase_order(days), AGGREGATE_TTL, move || async move {
                api.purchase_order(days).await
            })
            .await
    }

    /// Derived stock overview: composes the current stock list and the
    /// alert list client-side. Only yields once both underlying queries
    /// have resolved, and reflects whichever cache entries are current.
    pub async fn stock_overview(&self, days: u32) -> Result<StockOverview, Arc<ApiError>> {
        let (stock, alerts) = tokio::join!(self.current_stock(), self.stock_alerts(days));
        let stock = stock?;
        let alerts = alerts?;
        Ok(StockOverview {
            total_productos: stock.len(),
            criticos: alerts.iter().filter(|a| a.tipo_alerta.is_critical()).count(),
            bajos: alerts
                .iter()
                .filter(|a| a.tipo_alerta == AlertTier::Bajo)
                .count(),
            ok: alerts
                .iter()
                .filter(|a| a.tipo_alerta == AlertTier::Ok)
                .count(),
        })
    }

    pub async fn available_entities(
        &self,
        granularity: Granularity,
    ) -> QueryResult<AvailableEntitiesResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(
                keys::available_entities(granularity),
                AGGREGATE_TTL,
                move || async move { api.available_entities(granularity).await },
            )
            .await
    }

    pub async fn data_stats(&self) -> QueryResult<DataStatsResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::data_stats(), AGGREGATE_TTL, move || async move {
                api.data_stats().await
            })
            .await
    }

    pub async fn historical_data(&self, limit: Option<u32>) -> QueryResult<HistoricalDataResponse> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::historical(limit), AGGREGATE_TTL, move || async move {
                api.historical_data(limit).await
            })
            .await
    }

    pub async fn list_models(&self) -> QueryResult<Vec<ModelInfo>> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::models(), MODELS_TTL, move || async move {
                api.list_models().await
            })
            .await
    }

    pub async fn model_performance(&self) -> QueryResult<ModelPerformanceComparison> {
        let api = self.api.clone();
        self.cache
            .get_or_fetch(keys::model_performance(), MODELS_TTL, move || async move {
                api.model_performance().await
            })
            .await
    }

    // ==================== MUTATIONS ====================
    //
    // Each mutation runs the backend call first; only a successful call
    // invalidates. Invalidation itself cannot fail, and deliberately does
    // not feed back into the mutation result.

    pub async fn upload_sales_excel(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        retrain: Option<bool>,
    ) -> Result<UploadResponse, ApiError> {
        let response = self.api.upload_sales_excel(filename, bytes, retrain).await?;
        self.apply_invalidation(MutationKind::UploadSalesExcel);
        Ok(response)
    }

    pub async fn import_stock_excel(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StockImportResponse, ApiError> {
        let response = self.api.import_stock_excel(filename, bytes).await?;
        self.apply_invalidation(MutationKind::ImportStockExcel);
        Ok(response)
    }

    pub async fn create_stock_item(&self, item: &StockItemCreate) -> Result<StockItem, ApiError> {
        let created = self.api.create_stock_item(item).await?;
        self.apply_invalidation(MutationKind::CreateStockItem);
        Ok(created)
    }

    pub async fn adjust_stock(
        &self,
        producto: &str,
        request: &StockAdjustRequest,
    ) -> Result<StockItem, ApiError> {
        let adjusted = self.api.adjust_stock(producto, request).await?;
        self.apply_invalidation(MutationKind::AdjustStock);
        Ok(adjusted)
    }

    pub async fn delete_stock_item(&self, producto: &str) -> Result<SuccessResponse, ApiError> {
        let response = self.api.delete_stock_item(producto).await?;
        self.apply_invalidation(MutationKind::DeleteStockItem);
        Ok(response)
    }

    fn apply_invalidation(&self, kind: MutationKind) {
        let mut removed = 0;
        for prefix in invalidation_prefixes(kind) {
            removed += self.cache.invalidate_prefix(prefix);
        }
        tracing::debug!(?kind, removed, "invalidated query cache entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct Backend {
        url: Url,
        stock_gets: Arc<AtomicUsize>,
        alert_gets: Arc<AtomicUsize>,
        predict_gets: Arc<AtomicUsize>,
    }

    fn stock_body(updated: &str) -> Value {
        json!([
            {
                "producto": "Purina 20kg",
                "categoria": "Alimento",
                "cantidad_kg": 40.0,
                "cantidad_unidades": 2.0,
                "ultima_actualizacion": updated
            },
            {
                "producto": "Arena 10kg",
                "categoria": "Higiene",
                "cantidad_kg": 30.0,
                "cantidad_unidades": 3.0,
                "ultima_actualizacion": updated
            }
        ])
    }

    fn alerts_body() -> Value {
        json!([
            {"producto": "Purina 20kg", "categoria": "Alimento", "tipo_alerta": "agotado",
             "stock_actual_kg": 0.0, "demanda_proyectada_kg": 40.0, "dias_cobertura": 0.0},
            {"producto": "Pedigree 15kg", "categoria": "Alimento", "tipo_alerta": "critico",
             "stock_actual_kg": 5.0, "demanda_proyectada_kg": 35.0, "dias_cobertura": 4.2},
            {"producto": "Arena 10kg", "categoria": "Higiene", "tipo_alerta": "bajo",
             "stock_actual_kg": 12.0, "demanda_proyectada_kg": 30.0, "dias_cobertura": 12.0},
            {"producto": "Collar M", "categoria": "Collar", "tipo_alerta": "ok",
             "stock_actual_kg": 50.0, "demanda_proyectada_kg": 10.0, "dias_cobertura": 150.0}
        ])
    }

    async fn spawn_backend() -> Backend {
        let stock_gets = Arc::new(AtomicUsize::new(0));
        let alert_gets = Arc::new(AtomicUsize::new(0));
        let predict_gets = Arc::new(AtomicUsize::new(0));

        let router = Router::new()
            .route("/api/v1/stock/", {
                let hits = stock_gets.clone();
                get(move || {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    async move { Json(stock_body(&format!("2025-03-0{}T10:00:00", n + 1))) }
                })
            })
            .route("/api/v1/stock/alerts/all", {
                let hits = alert_gets.clone();
                get(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async move { Json(alerts_body()) }
                })
            })
            .route(
                "/api/v1/stock/:producto/adjust",
                post(|Path(producto): Path<String>| async move {
                    Json(json!({
                        "producto": producto,
                        "categoria": "Alimento",
                        "cantidad_kg": 38.0,
                        "cantidad_unidades": 2.0,
                        "ultima_actualizacion": "2025-03-02T11:00:00"
                    }))
                }),
            )
            .route("/api/v1/products/predict/categoria/:name", {
                let hits = predict_gets.clone();
                get(move |Path(name): Path<String>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Json(json!({
                            "entity": name,
                            "granularity": "categoria",
                            "days": 30,
                            "target": "kilos",
                            "total": 10.0,
                            "predictions": [
                                {"date": "2025-03-03", "predicted_kilos": 10.0, "predicted_sales": null}
                            ]
                        }))
                    }
                })
            })
            .route(
                "/api/v1/upload/excel",
                post(|| async {
                    Json(json!({
                        "success": true,
                        "message": "importado",
                        "filename": "ventas.xlsx",
                        "records_processed": 10,
                        "records_added": 10,
                        "duplicates_removed": 0,
                        "total_records": 100,
                        "data_period": {"start": "2024-01-02", "end": "2025-02-28", "unique_days": 300},
                        "model_retrained": false
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Backend {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            stock_gets,
            alert_gets,
            predict_gets,
        }
    }

    fn client_for(backend: &Backend) -> QueryClient {
        QueryClient::new(Arc::new(ForecastClient::new(backend.url.clone())))
    }

    #[tokio::test]
    async fn identical_queries_share_one_network_call() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        let first = queries.current_stock().await.unwrap();
        let second = queries.current_stock().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_predictions_issue_one_request() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        let (a, b) = tokio::join!(
            queries.predict(Granularity::Categoria, "Alimento", 30, Target::Kilos),
            queries.predict(Granularity::Categoria, "Alimento", 30, Target::Kilos),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(backend.predict_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn adjust_invalidates_stock_reads() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        let before = queries.current_stock().await.unwrap();
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 1);

        let request = StockAdjustRequest {
            cantidad_kg_delta: Some(-2.0),
            cantidad_unidades_delta: None,
            motivo: "venta".to_string(),
        };
        queries.adjust_stock("Purina 20kg", &request).await.unwrap();

        // Within the staleness window, but the entry must not be reused.
        let after = queries.current_stock().await.unwrap();
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_ne!(before[0].ultima_actualizacion, after[0].ultima_actualizacion);
    }

    #[tokio::test]
    async fn upload_invalidates_predictions_but_not_stock() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        queries
            .predict(Granularity::Categoria, "Alimento", 30, Target::Kilos)
            .await
            .unwrap();
        queries.current_stock().await.unwrap();

        queries
            .upload_sales_excel("ventas.xlsx", b"sheet".to_vec(), None)
            .await
            .unwrap();

        queries
            .predict(Granularity::Categoria, "Alimento", 30, Target::Kilos)
            .await
            .unwrap();
        queries.current_stock().await.unwrap();

        assert_eq!(backend.predict_gets.load(Ordering::SeqCst), 2);
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stock_overview_counts_tiers() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        let overview = queries.stock_overview(30).await.unwrap();
        assert_eq!(
            overview,
            StockOverview {
                total_productos: 2,
                criticos: 2,
                bajos: 1,
                ok: 1,
            }
        );

        // Composition reuses the two underlying cache entries.
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 1);
        assert_eq!(backend.alert_gets.load(Ordering::SeqCst), 1);
        queries.stock_overview(30).await.unwrap();
        assert_eq!(backend.stock_gets.load(Ordering::SeqCst), 1);
        assert_eq!(backend.alert_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn critical_alerts_filter_reuses_cache() {
        let backend = spawn_backend().await;
        let queries = client_for(&backend);

        let critical = queries.critical_stock_alerts(30).await.unwrap();
        assert_eq!(critical.len(), 2);
        assert!(critical.iter().all(|a| a.tipo_alerta.is_critical()));
        queries.critical_stock_alerts(30).await.unwrap();
        assert_eq!(backend.alert_gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn health_refresh_keeps_probing_without_readers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route("/health", {
            let hits = hits.clone();
            get(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                async move {
                    Json(json!({
                        "status": "healthy",
                        "version": "1.0.0",
                        "environment": "test",
                        "models_loaded": 3,
                        "uptime_seconds": 12.5
                    }))
                }
            })
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}")).unwrap();
        let queries = Arc::new(QueryClient::new(Arc::new(ForecastClient::new(url))));
        let refresher = queries.spawn_health_refresh(Duration::from_millis(40));

        tokio::time::sleep(Duration::from_millis(150)).await;
        refresher.abort();

        // The poller alone must have probed the backend more than once.
        assert!(hits.load(Ordering::SeqCst) >= 2);

        // With the poller gone, readers answer from the cached probe.
        queries.health().await.unwrap();
        let before = hits.load(Ordering::SeqCst);
        queries.health().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), before);
    }
}
