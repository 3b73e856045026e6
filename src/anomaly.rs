//! Outlier detection on a window of readings.

use serde::Serialize;

use crate::data::Reading;
use crate::data::numeric::round2;

/// Default per-reading energy above which a reading is flagged.
pub const DEFAULT_THRESHOLD_KWH: f64 = 5.0;

/// A reading flagged as unusual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub device: String,
    pub timestamp: chrono::NaiveDateTime,
    pub energy_kwh: f64,
    pub reason: String,
}

/// Anomaly detection capability. Implementations may be rule- or
/// model-backed; they run beside the metrics engine, never inside it.
pub trait AnomalyPort {
    /// Returns the outliers among `readings`, in input order.
    fn detect(&self, readings: &[Reading]) -> Vec<Outlier>;
}

/// Flags every reading whose energy exceeds a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDetector {
    pub threshold_kwh: f64,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self {
            threshold_kwh: DEFAULT_THRESHOLD_KWH,
        }
    }
}

impl ThresholdDetector {
    pub fn new(threshold_kwh: f64) -> Self {
        Self { threshold_kwh }
    }
}

impl AnomalyPort for ThresholdDetector {
    fn detect(&self, readings: &[Reading]) -> Vec<Outlier> {
        readings
            .iter()
            .filter(|r| r.energy_kwh > self.threshold_kwh)
            .map(|r| Outlier {
                device: r.device_name.clone(),
                timestamp: r.timestamp,
                energy_kwh: round2(r.energy_kwh),
                reason: "Unusually high consumption spike".to_string(),
            })
            .collect()
    }
}
