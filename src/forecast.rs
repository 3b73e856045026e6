//! Consumption forecasting behind a swappable port.

use serde::Serialize;

use crate::billing::SlabTariff;
use crate::data::numeric::{non_negative_or_zero, round2};
use crate::error::MetricsError;
use crate::metrics::MetricsSnapshot;

/// Inputs a forecaster may use, taken from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastFeatures {
    /// Lifetime energy per day with data (kWh/day).
    pub lifetime_daily_rate_kwh: f64,
    /// Current-period energy per day with data (kWh/day).
    pub current_daily_rate_kwh: f64,
    pub night_usage_percent: f64,
    pub active_device_count: usize,
}

impl ForecastFeatures {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            lifetime_daily_rate_kwh: snapshot.lifetime_daily_rate_kwh,
            current_daily_rate_kwh: round2(snapshot.current_daily_rate_kwh()),
            night_usage_percent: snapshot.night_usage_percent,
            active_device_count: snapshot.active_device_count,
        }
    }
}

/// Predicts daily consumption (kWh/day).
pub trait ForecastPort: Send + Sync {
    /// Label reported alongside the forecast.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`MetricsError::Port`] when the backing model fails.
    fn predict(&self, features: &ForecastFeatures) -> Result<f64, MetricsError>;
}

/// Naive "tomorrow looks like the average day" forecaster.
///
/// Repeats the lifetime daily rate; needs no trained model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveForecast;

impl ForecastPort for NaiveForecast {
    fn name(&self) -> &str {
        "naive_daily_rate"
    }

    fn predict(&self, features: &ForecastFeatures) -> Result<f64, MetricsError> {
        Ok(features.lifetime_daily_rate_kwh)
    }
}

/// Projected consumption over the next day, week and month, with the bill
/// the monthly figure would produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub model: String,
    pub next_day_kwh: f64,
    pub next_week_kwh: f64,
    pub next_month_kwh: f64,
    pub next_month_bill: f64,
    pub currency: String,
}

/// Scales the port's daily prediction to a week (7 d) and a month (30 d).
///
/// # Errors
///
/// Propagates the port's error.
pub fn project(
    port: &dyn ForecastPort,
    features: &ForecastFeatures,
    tariff: &SlabTariff,
) -> Result<ForecastReport, MetricsError> {
    let daily = non_negative_or_zero(port.predict(features)?);
    let month = round2(daily * 30.0);
    Ok(ForecastReport {
        model: port.name().to_string(),
        next_day_kwh: round2(daily),
        next_week_kwh: round2(daily * 7.0),
        next_month_kwh: month,
        next_month_bill: tariff.bill(month)?,
        currency: tariff.currency.clone(),
    })
}
