//! Request handlers for the API endpoints.
//!
//! Every data-backed handler loads the timeline once and computes one
//! snapshot inside `spawn_blocking`; nothing is cached between requests.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use super::AppState;
use super::types::{
    AlertsResponse, BillQuery, ChatRequest, DashboardResponse, ErrorResponse, EstimateRequest,
    EstimateResponse, HealthResponse,
};
use crate::alerts::Alert;
use crate::billing::BillBreakdown;
use crate::error::MetricsError;
use crate::forecast::{ForecastFeatures, ForecastReport, project};
use crate::metrics::{Insight, MetricsSnapshot, TimelineReport, daily_series};
use crate::nlq::{Answer, Intent};

/// A [`MetricsError`] (or a failed blocking task) as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<MetricsError> for ApiError {
    fn from(e: MetricsError) -> Self {
        let status = match &e {
            MetricsError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MetricsError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MetricsError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            MetricsError::Port(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs `f` on the blocking pool with a clone of the shared state.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, MetricsError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("worker failed: {e}"),
        })?
        .map_err(ApiError::from)
}

/// `GET /health` → 200
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /metrics` → 200 + `MetricsSnapshot`
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> ApiResult<MetricsSnapshot> {
    blocking(&state, |s| s.engine.compute()).await.map(Json)
}

/// `GET /dashboard` → snapshot, insights and anomalies from one load.
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> ApiResult<DashboardResponse> {
    blocking(&state, |s| {
        let timeline = s.engine.load()?;
        let metrics = s.engine.compute_from(&timeline);
        let anomalies = s.current_anomalies(&timeline);
        Ok(DashboardResponse {
            insights: s.insights.insights(&metrics, metrics.lifetime_daily_rate_kwh),
            anomaly_count: anomalies.len(),
            anomalies,
            metrics,
        })
    })
    .await
    .map(Json)
}

/// `GET /insights` → 200 + `[Insight]`
pub async fn get_insights(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Insight>> {
    blocking(&state, |s| {
        let metrics = s.engine.compute()?;
        Ok(s.insights.insights(&metrics, metrics.lifetime_daily_rate_kwh))
    })
    .await
    .map(Json)
}

/// `GET /timeline` → per-day series of the current period.
pub async fn get_timeline(State(state): State<Arc<AppState>>) -> ApiResult<TimelineReport> {
    blocking(&state, |s| {
        let timeline = s.engine.load()?;
        let metrics = s.engine.compute_from(&timeline);
        Ok(daily_series(&timeline, &metrics))
    })
    .await
    .map(Json)
}

/// `GET /alerts` → continuous-operation alerts near the dataset anchor.
pub async fn get_alerts(State(state): State<Arc<AppState>>) -> ApiResult<AlertsResponse> {
    blocking(&state, |s| {
        let alerts: Vec<Alert> = s.alerts.detect(&s.engine.load()?);
        Ok(AlertsResponse {
            alert_count: alerts.len(),
            alerts,
            monitoring_window_hours: s.alerts.window_hours(),
        })
    })
    .await
    .map(Json)
}

/// Itemized slab bill for an arbitrary consumption.
///
/// `GET /bill?kwh=250` → 200 + `BillBreakdown`
/// `GET /bill` or `GET /bill?kwh=-1` → 400 + `ErrorResponse`
pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillQuery>,
) -> ApiResult<BillBreakdown> {
    let raw = query
        .kwh
        .ok_or_else(|| MetricsError::InvalidArgument("missing `kwh` query parameter".into()))?;
    let kwh: f64 = raw
        .trim()
        .parse()
        .map_err(|_| MetricsError::InvalidArgument(format!("`kwh` is not a number: {raw}")))?;
    Ok(Json(state.engine.tariff().breakdown(kwh)?))
}

/// `GET /forecast` → next day/week/month projection and bill.
pub async fn get_forecast(State(state): State<Arc<AppState>>) -> ApiResult<ForecastReport> {
    blocking(&state, |s| {
        let metrics = s.engine.compute()?;
        let features = ForecastFeatures::from_snapshot(&metrics);
        project(s.forecast.as_ref(), &features, s.engine.tariff())
    })
    .await
    .map(Json)
}

/// `POST /estimate` → what-if energy for one appliance run.
pub async fn post_estimate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EstimateRequest>,
) -> ApiResult<EstimateResponse> {
    let features = req.features();
    let response = if req.explain {
        let explanation = state.explainer.predict_with_attribution(&features)?;
        EstimateResponse {
            estimated_kwh: explanation.estimated_kwh,
            explanation: Some(explanation),
        }
    } else {
        EstimateResponse {
            estimated_kwh: state.estimator.predict(&features)?,
            explanation: None,
        }
    };
    Ok(Json(response))
}

/// `POST /chat` → answer rendered from the current snapshot.
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Answer> {
    if req.question.trim().is_empty() {
        return Err(MetricsError::InvalidArgument("question must not be empty".into()).into());
    }
    let previous: Option<Intent> = req.previous_intent.as_deref().and_then(|p| p.parse().ok());
    blocking(&state, move |s| {
        let timeline = s.engine.load()?;
        let metrics = s.engine.compute_from(&timeline);
        let anomaly_count = s.current_anomalies(&timeline).len();
        Ok(s.nlq.answer(&req.question, &metrics, anomaly_count, previous))
    })
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::config::AppConfig;
    use crate::data::{DaytimeBand, Reading};
    use crate::io::{CsvDataSource, DataSource, InMemorySource};

    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 31)
            .and_then(|d| d.and_hms_opt(20, 0, 0))
            .unwrap()
    }

    fn make_test_state() -> Arc<AppState> {
        let band = DaytimeBand::default();
        let r = |t, name: &str, kind: &str, watts: f64, kwh| {
            Reading::new(t, name, kind, watts, 60.0, Some(kwh), &band)
        };
        let a = anchor();
        let readings = vec![
            r(a - Duration::days(40), "Air Conditioner", "cooling", 1500.0, 6.0),
            r(a - Duration::days(40), "Refrigerator", "refrigeration", 150.0, 4.0),
            r(a - Duration::days(3), "Air Conditioner", "cooling", 1500.0, 7.5),
            r(a - Duration::hours(3), "Air Conditioner", "cooling", 1500.0, 1.5),
            r(a - Duration::hours(2), "Air Conditioner", "cooling", 1500.0, 1.0),
            r(a - Duration::hours(1), "Air Conditioner", "cooling", 0.0, 0.0),
            r(a, "Refrigerator", "refrigeration", 150.0, 4.0),
        ];
        let source: Arc<dyn DataSource + Send + Sync> = Arc::new(InMemorySource::new(readings));
        Arc::new(AppState::from_config(AppConfig::default(), source))
    }

    async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post(
        state: Arc<AppState>,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_returns_200() {
        let (status, json) = get(make_test_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_are_consistent() {
        let (status, json) = get(make_test_state(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_energy_kwh"], 14.0);
        assert_eq!(json["device_wise_energy_kwh"]["Air Conditioner"], 10.0);
        assert_eq!(json["previous_total_kwh"], 10.0);
        assert_eq!(json["primary_driver"]["device"], "Air Conditioner");
    }

    #[tokio::test]
    async fn dashboard_carries_snapshot_insights_and_anomalies() {
        let (status, json) = get(make_test_state(), "/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metrics"]["total_energy_kwh"], 14.0);
        // only the 7.5 kWh reading exceeds 5 kWh in the current window
        assert_eq!(json["anomaly_count"], 1);
        assert_eq!(json["insights"][0]["type"], "dominant_load");
    }

    #[tokio::test]
    async fn timeline_sums_match_snapshot() {
        let (status, json) = get(make_test_state(), "/timeline").await;
        assert_eq!(status, StatusCode::OK);
        let days = json["days"].as_array().unwrap();
        let sum: f64 = days.iter().filter_map(|d| d["energy_kwh"].as_f64()).sum();
        assert!((sum - 14.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn alerts_flag_long_ac_run() {
        let (status, json) = get(make_test_state(), "/alerts").await;
        assert_eq!(status, StatusCode::OK);
        // AC active from anchor-3h to anchor-2h only (0 W at anchor-1h)
        assert_eq!(json["alert_count"], 0);
        assert_eq!(json["monitoring_window_hours"], 3.0);
    }

    #[tokio::test]
    async fn bill_breaks_down_slabs() {
        let (status, json) = get(make_test_state(), "/bill?kwh=250").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount"], 1200.0);
        assert_eq!(json["lines"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn bill_rejects_bad_input_with_400() {
        for uri in ["/bill", "/bill?kwh=abc", "/bill?kwh=-5"] {
            let (status, json) = get(make_test_state(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(json.get("error").is_some());
        }
    }

    #[tokio::test]
    async fn forecast_uses_lifetime_rate() {
        let (status, json) = get(make_test_state(), "/forecast").await;
        assert_eq!(status, StatusCode::OK);
        // 24 kWh over 3 distinct days
        assert_eq!(json["next_day_kwh"], 8.0);
        assert_eq!(json["next_month_kwh"], 240.0);
    }

    #[tokio::test]
    async fn estimate_with_explanation() {
        let body = serde_json::json!({
            "power_watts": 2000,
            "duration_minutes": 90,
            "duty_cycle": 0.5,
            "explain": true
        });
        let (status, json) = post(make_test_state(), "/estimate", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["estimated_kwh"], 1.5);
        assert_eq!(json["explanation"]["contributions"][0]["feature"], "rated_load");
    }

    #[tokio::test]
    async fn estimate_rejects_negative_power() {
        let body = serde_json::json!({"power_watts": -1, "duration_minutes": 10});
        let (status, _) = post(make_test_state(), "/estimate", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_answers_from_snapshot() {
        let body = serde_json::json!({"question": "How much does the AC use?"});
        let (status, json) = post(make_test_state(), "/chat", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["intent"], "device_specific");
        assert!(json["answer"].as_str().unwrap().contains("10.00 kWh"));
    }

    #[tokio::test]
    async fn chat_follow_up_uses_previous_intent() {
        let body = serde_json::json!({"question": "and now?", "previous_intent": "BILLING"});
        let (_, json) = post(make_test_state(), "/chat", body).await;
        assert_eq!(json["intent"], "billing");
    }

    #[tokio::test]
    async fn missing_dataset_returns_503() {
        let source: Arc<dyn DataSource + Send + Sync> = Arc::new(CsvDataSource::new(
            "/definitely/not/here.csv",
            DaytimeBand::default(),
        ));
        let state = Arc::new(AppState::from_config(AppConfig::default(), source));
        let (status, json) = get(state, "/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["error"].as_str().unwrap().contains("data unavailable"));
    }

    #[tokio::test]
    async fn empty_dataset_is_not_an_error() {
        let source: Arc<dyn DataSource + Send + Sync> = Arc::new(InMemorySource::new(Vec::new()));
        let state = Arc::new(AppState::from_config(AppConfig::default(), source));
        let (status, json) = get(state, "/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metrics"]["total_energy_kwh"], 0.0);
        assert_eq!(json["anomaly_count"], 0);
    }
}
