//! REST API over the metrics engine and its consumers.
//!
//! Read endpoints:
//! - `/health`, `/metrics`, `/dashboard`, `/insights`, `/timeline`,
//!   `/alerts`, `/forecast`, `/bill?kwh=`
//!
//! Write-style endpoints (no server-side state is changed):
//! - `POST /estimate`, `POST /chat`

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

pub use handlers::ApiError;
pub use types::{
    AlertsResponse, ChatRequest, DashboardResponse, ErrorResponse, EstimateRequest,
    EstimateResponse, HealthResponse,
};

use crate::alerts::AlertDetector;
use crate::anomaly::{AnomalyPort, Outlier, ThresholdDetector};
use crate::config::AppConfig;
use crate::data::Timeline;
use crate::estimate::{EstimationPort, ExplainPort, PhysicsEstimator};
use crate::forecast::{ForecastPort, NaiveForecast};
use crate::io::DataSource;
use crate::metrics::{InsightFormatter, MetricsEngine};
use crate::nlq::NlQueryBridge;

/// Data source shared by every request.
pub type SharedSource = Arc<dyn DataSource + Send + Sync>;

/// Immutable application state shared across all request handlers.
///
/// Holds capabilities, not data: every request reloads the timeline through
/// the engine, so no locks are needed.
pub struct AppState {
    /// Configuration the state was built from.
    pub config: AppConfig,
    pub engine: MetricsEngine<SharedSource>,
    pub insights: InsightFormatter,
    pub anomaly: Arc<dyn AnomalyPort + Send + Sync>,
    pub alerts: AlertDetector,
    pub forecast: Arc<dyn ForecastPort>,
    pub estimator: Arc<dyn EstimationPort>,
    pub explainer: Arc<dyn ExplainPort>,
    pub nlq: NlQueryBridge,
}

impl AppState {
    /// Wires the deterministic fallback for every port.
    pub fn from_config(config: AppConfig, source: SharedSource) -> Self {
        Self {
            engine: MetricsEngine::from_config(source, &config),
            insights: InsightFormatter::new(config.insights.high_usage_margin),
            anomaly: Arc::new(ThresholdDetector::new(config.anomaly.threshold_kwh)),
            alerts: AlertDetector::from_config(&config.alerts),
            forecast: Arc::new(NaiveForecast),
            estimator: Arc::new(PhysicsEstimator),
            explainer: Arc::new(PhysicsEstimator),
            nlq: NlQueryBridge::default(),
            config,
        }
    }

    /// Replaces the forecaster.
    pub fn with_forecast(mut self, port: Arc<dyn ForecastPort>) -> Self {
        self.forecast = port;
        self
    }

    /// Replaces the anomaly detector.
    pub fn with_anomaly(mut self, port: Arc<dyn AnomalyPort + Send + Sync>) -> Self {
        self.anomaly = port;
        self
    }

    /// Replaces the chat bridge (e.g. to plug in another classifier).
    pub fn with_nlq(mut self, bridge: NlQueryBridge) -> Self {
        self.nlq = bridge;
        self
    }

    /// Outliers among the readings of the current period.
    pub fn current_anomalies(&self, timeline: &Timeline) -> Vec<Outlier> {
        self.engine
            .windows(timeline)
            .map(|w| self.anomaly.detect(w.current))
            .unwrap_or_default()
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/insights", get(handlers::get_insights))
        .route("/timeline", get(handlers::get_timeline))
        .route("/alerts", get(handlers::get_alerts))
        .route("/bill", get(handlers::get_bill))
        .route("/forecast", get(handlers::get_forecast))
        .route("/estimate", post(handlers::post_estimate))
        .route("/chat", post(handlers::post_chat))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Errors
///
/// Returns the I/O error when the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
