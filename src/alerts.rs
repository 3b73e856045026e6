//! Continuous-operation alerts for devices left running.
//!
//! Looks at the last few hours before the dataset anchor and flags every
//! device whose active runtime crosses the thresholds configured for its
//! `device_type`. Types without thresholds (refrigeration) never alert.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::config::{AlertThreshold, AlertsConfig};
use crate::data::numeric::round2;
use crate::data::{Reading, Timeline};
use crate::metrics::window::saturating_sub;

/// How far past its thresholds a device has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One device running longer than expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// `<device>_<first active minute>`, stable across reloads.
    pub id: String,
    pub device: String,
    pub device_type: String,
    /// Active runtime inside the look-back window (hours, 1 dp).
    pub duration_hours: f64,
    pub severity: Severity,
    pub message: String,
    pub first_detected: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    /// Mean power of the active readings (W).
    pub power_watts: f64,
    /// Cost of the runtime at the flat rate.
    pub estimated_cost: f64,
}

/// Detects continuous operation from a timeline.
#[derive(Debug, Clone)]
pub struct AlertDetector {
    window: Duration,
    flat_rate_per_kwh: f64,
    thresholds: BTreeMap<String, AlertThreshold>,
}

impl Default for AlertDetector {
    fn default() -> Self {
        Self::from_config(&AlertsConfig::default())
    }
}

impl AlertDetector {
    pub fn from_config(config: &AlertsConfig) -> Self {
        let window_secs = (config.window_hours.max(0.0) * 3600.0).round() as i64;
        Self {
            window: Duration::try_seconds(window_secs).unwrap_or(Duration::MAX),
            flat_rate_per_kwh: config.flat_rate_per_kwh,
            thresholds: config
                .thresholds
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), *v))
                .collect(),
        }
    }

    /// Look-back window in hours.
    pub fn window_hours(&self) -> f64 {
        self.window.num_seconds() as f64 / 3600.0
    }

    /// Returns alerts sorted critical first, then by longer runtime, then by
    /// device name.
    pub fn detect(&self, timeline: &Timeline) -> Vec<Alert> {
        let Some(anchor) = timeline.anchor() else {
            return Vec::new();
        };
        let start = saturating_sub(anchor, self.window);
        let readings = timeline.readings();
        let recent = &readings[readings.partition_point(|r| r.timestamp < start)..];

        let mut by_device: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
        for r in recent {
            by_device.entry(r.device_name.as_str()).or_default().push(r);
        }

        let mut alerts: Vec<Alert> = by_device
            .into_iter()
            .filter_map(|(device, rows)| self.evaluate(device, &rows))
            .collect();
        alerts.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then(b.duration_hours.total_cmp(&a.duration_hours))
                .then_with(|| a.device.cmp(&b.device))
        });
        alerts
    }

    fn evaluate(&self, device: &str, rows: &[&Reading]) -> Option<Alert> {
        let device_type = rows.first()?.device_type.clone();
        let threshold = self.thresholds.get(&device_type.to_ascii_lowercase())?;

        let active: Vec<&Reading> = rows.iter().copied().filter(|r| r.power_watts > 0.0).collect();
        // rows are in timeline order
        let first = active.first()?.timestamp;
        let last = active.last()?.timestamp;
        let hours = (last - first).num_seconds() as f64 / 3600.0;

        let severity = if hours >= threshold.critical_hours {
            Severity::Critical
        } else if hours >= threshold.warning_hours {
            Severity::Warning
        } else {
            return None;
        };

        let avg_watts = active.iter().map(|r| r.power_watts).sum::<f64>() / active.len() as f64;
        Some(Alert {
            id: format!("{device}_{}", first.format("%Y%m%d%H%M")),
            device: device.to_string(),
            device_type,
            duration_hours: (hours * 10.0).round() / 10.0,
            severity,
            message: message(device, hours, severity),
            first_detected: first,
            last_seen: last,
            power_watts: round2(avg_watts),
            estimated_cost: round2(avg_watts / 1000.0 * hours * self.flat_rate_per_kwh),
        })
    }
}

fn message(device: &str, hours: f64, severity: Severity) -> String {
    match severity {
        Severity::Critical => format!(
            "CRITICAL: {device} has been running for {hours:.1} hours. \
             Check if it was left on by accident."
        ),
        Severity::Warning => format!(
            "WARNING: {device} has been on for {hours:.1} hours. Verify it is still needed."
        ),
    }
}
