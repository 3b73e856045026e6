//! TOML-based application configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::billing::{Slab, SlabTariff};
use crate::data::DaytimeBand;

/// Longest accepted `windowing.period_days`.
pub const MAX_PERIOD_DAYS: i64 = 3650;
/// Longest accepted `alerts.window_hours`.
pub const MAX_ALERT_WINDOW_HOURS: f64 = 8760.0;
/// Largest accepted `demo.days`.
pub const MAX_DEMO_DAYS: u32 = 3650;


/// Top-level configuration parsed from TOML.
///
/// All fields have defaults. Load from TOML with
/// [`AppConfig::from_toml_file`] or use [`AppConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Where readings come from.
    #[serde(default)]
    pub data: DataConfig,
    /// Slab tariff.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Period lengths.
    #[serde(default)]
    pub windowing: WindowingConfig,
    /// Daytime hours for the night-usage rule.
    #[serde(default)]
    pub daytime: DaytimeConfig,
    /// Insight thresholds.
    #[serde(default)]
    pub insights: InsightsConfig,
    /// Per-reading anomaly rule.
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    /// Continuous-operation alerts.
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// HTTP listener.
    #[serde(default)]
    pub api: ApiConfig,
    /// Synthetic dataset parameters.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Dataset location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Source kind: `"csv"` or `"demo"`.
    pub source: String,
    /// CSV path, used when `source = "csv"`.
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: "csv".to_string(),
            path: PathBuf::from("data/energy_usage.csv"),
        }
    }
}

/// Slab tariff configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingConfig {
    /// ISO currency code.
    pub currency: String,
    /// Slabs in billing order; only the last may omit `width_kwh`.
    pub slabs: Vec<Slab>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        let tariff = SlabTariff::default();
        Self {
            currency: tariff.currency,
            slabs: tariff.slabs,
        }
    }
}

impl BillingConfig {
    /// Builds the tariff described by this section.
    pub fn tariff(&self) -> SlabTariff {
        SlabTariff::new(self.slabs.clone(), self.currency.clone())
    }
}

/// Period lengths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowingConfig {
    /// Length of the current and previous periods (days, > 0).
    pub period_days: i64,
}

impl Default for WindowingConfig {
    fn default() -> Self {
        Self { period_days: 30 }
    }
}

/// Inclusive daytime band.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaytimeConfig {
    /// First daytime hour (0–23).
    pub start_hour: u32,
    /// Last daytime hour (0–23, >= `start_hour`).
    pub end_hour: u32,
}

impl Default for DaytimeConfig {
    fn default() -> Self {
        let band = DaytimeBand::default();
        Self {
            start_hour: band.start_hour,
            end_hour: band.end_hour,
        }
    }
}

impl DaytimeConfig {
    /// The band used to derive night flags.
    pub fn band(&self) -> DaytimeBand {
        DaytimeBand {
            start_hour: self.start_hour,
            end_hour: self.end_hour,
        }
    }
}

/// Insight thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    /// Fraction above the historical daily rate that counts as high usage.
    pub high_usage_margin: f64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            high_usage_margin: 0.10,
        }
    }
}

/// Per-reading anomaly rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyConfig {
    /// Readings above this energy are flagged (kWh).
    pub threshold_kwh: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self { threshold_kwh: 5.0 }
    }
}

/// Runtime thresholds for one device type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertThreshold {
    /// Continuous runtime that raises a warning (hours).
    pub warning_hours: f64,
    /// Continuous runtime that raises a critical alert (hours).
    pub critical_hours: f64,
}

/// Continuous-operation alert configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    /// Look-back window before the dataset anchor (hours).
    pub window_hours: f64,
    /// Flat rate used to price an alert's runtime.
    pub flat_rate_per_kwh: f64,
    /// Thresholds keyed by `device_type`; types without an entry never alert.
    pub thresholds: BTreeMap<String, AlertThreshold>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        let thresholds = [
            ("cooling", 2.0, 3.0),
            ("laundry", 3.0, 5.0),
            ("electronics", 4.0, 8.0),
            ("lighting", 6.0, 12.0),
        ]
        .into_iter()
        .map(|(t, warning_hours, critical_hours)| {
            (
                t.to_string(),
                AlertThreshold {
                    warning_hours,
                    critical_hours,
                },
            )
        })
        .collect();
        Self {
            window_hours: 3.0,
            flat_rate_per_kwh: 0.12,
            thresholds,
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Synthetic dataset parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Master random seed.
    pub seed: u64,
    /// Number of days to generate (> 0).
    pub days: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { seed: 42, days: 75 }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"windowing.period_days"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl AppConfig {
    /// Returns the demo preset: a synthetic household instead of a CSV file.
    pub fn demo() -> Self {
        Self {
            data: DataConfig {
                source: "demo".to_string(),
                ..DataConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "demo"];

    /// Loads configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default()),
            "demo" => Ok(Self::demo()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let d = &self.data;
        if d.source != "csv" && d.source != "demo" {
            errors.push(ConfigError {
                field: "data.source".into(),
                message: format!("must be \"csv\" or \"demo\", got \"{}\"", d.source),
            });
        }
        if d.source == "csv" && d.path.as_os_str().is_empty() {
            errors.push(ConfigError {
                field: "data.path".into(),
                message: "must not be empty".into(),
            });
        }

        for problem in self.billing.tariff().problems() {
            errors.push(ConfigError {
                field: "billing.slabs".into(),
                message: problem,
            });
        }
        if self.billing.currency.trim().is_empty() {
            errors.push(ConfigError {
                field: "billing.currency".into(),
                message: "must not be empty".into(),
            });
        }

        if self.windowing.period_days <= 0 || self.windowing.period_days > MAX_PERIOD_DAYS {
            errors.push(ConfigError {
                field: "windowing.period_days".into(),
                message: format!("must be in 1..={MAX_PERIOD_DAYS}"),
            });
        }

        let dt = &self.daytime;
        if dt.end_hour > 23 {
            errors.push(ConfigError {
                field: "daytime.end_hour".into(),
                message: "must be <= 23".into(),
            });
        }
        if dt.start_hour > dt.end_hour {
            errors.push(ConfigError {
                field: "daytime.start_hour".into(),
                message: "must be <= daytime.end_hour".into(),
            });
        }

        if !self.insights.high_usage_margin.is_finite() || self.insights.high_usage_margin < 0.0 {
            errors.push(ConfigError {
                field: "insights.high_usage_margin".into(),
                message: "must be a finite number >= 0".into(),
            });
        }

        if !self.anomaly.threshold_kwh.is_finite() || self.anomaly.threshold_kwh <= 0.0 {
            errors.push(ConfigError {
                field: "anomaly.threshold_kwh".into(),
                message: "must be > 0".into(),
            });
        }

        let al = &self.alerts;
        if !al.window_hours.is_finite()
            || al.window_hours <= 0.0
            || al.window_hours > MAX_ALERT_WINDOW_HOURS
        {
            errors.push(ConfigError {
                field: "alerts.window_hours".into(),
                message: format!("must be > 0 and <= {MAX_ALERT_WINDOW_HOURS}"),
            });
        }
        if !al.flat_rate_per_kwh.is_finite() || al.flat_rate_per_kwh < 0.0 {
            errors.push(ConfigError {
                field: "alerts.flat_rate_per_kwh".into(),
                message: "must be >= 0".into(),
            });
        }
        for (device_type, t) in &al.thresholds {
            if t.warning_hours > t.critical_hours {
                errors.push(ConfigError {
                    field: format!("alerts.thresholds.{device_type}.warning_hours"),
                    message: "must be <= critical_hours".into(),
                });
            }
        }

        if self.demo.days == 0 || self.demo.days > MAX_DEMO_DAYS {
            errors.push(ConfigError {
                field: "demo.days".into(),
                message: format!("must be in 1..={MAX_DEMO_DAYS}"),
            });
        }

        errors
    }
}
