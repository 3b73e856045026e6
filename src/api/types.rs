//! API request, query and response types.

use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::anomaly::Outlier;
use crate::estimate::{EstimationFeatures, Explanation};
use crate::metrics::{Insight, MetricsSnapshot};

/// Liveness probe body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Everything the dashboard renders, from a single computation.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub metrics: MetricsSnapshot,
    pub insights: Vec<Insight>,
    pub anomalies: Vec<Outlier>,
    pub anomaly_count: usize,
}

/// Continuous-operation alerts.
#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
    pub monitoring_window_hours: f64,
}

/// Query parameters for `GET /bill`.
///
/// `kwh` stays a string so a malformed value gets the JSON error body.
#[derive(Debug, Deserialize)]
pub struct BillQuery {
    pub kwh: Option<String>,
}

/// Body of `POST /estimate`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimateRequest {
    pub power_watts: f64,
    pub duration_minutes: f64,
    #[serde(default)]
    pub duty_cycle: Option<f64>,
    /// Include the per-feature attribution.
    #[serde(default)]
    pub explain: bool,
}

impl EstimateRequest {
    pub fn features(&self) -> EstimationFeatures {
        EstimationFeatures {
            power_watts: self.power_watts,
            duration_minutes: self.duration_minutes,
            duty_cycle: self.duty_cycle,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimated_kwh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    /// Intent of the previous turn, echoed back by the client.
    #[serde(default)]
    pub previous_intent: Option<String>,
}

/// Error body used for every non-2xx status.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
}
