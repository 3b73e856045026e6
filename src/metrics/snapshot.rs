//! The metrics contract every consumer reads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::window::{Period, PrimaryDriver};
use crate::data::numeric::{ratio_or_zero, round2};

/// Night-time share of the total that efficiency advice aims for (percent).
pub const NIGHT_USAGE_TARGET_PERCENT: f64 = 20.0;
/// Fraction of the current bill expected back from meeting that target.
pub const NIGHT_SHIFT_SAVINGS_SHARE: f64 = 0.15;

/// One internally consistent set of numbers for the current period.
///
/// Produced only by [`MetricsEngine`](super::engine::MetricsEngine). Every
/// float is finite and rounded to two decimals; `total_energy_kwh` is the sum
/// of `device_wise_energy_kwh`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Current-period energy (kWh).
    pub total_energy_kwh: f64,
    /// Devices with at least one reading in the current period.
    pub active_device_count: usize,
    /// Current-period energy per device (kWh).
    pub device_wise_energy_kwh: BTreeMap<String, f64>,
    /// Share of current-period energy used at night (0–100).
    pub night_usage_percent: f64,
    /// Slab bill for `total_energy_kwh`.
    pub current_bill: f64,
    /// Slab bill for `previous_total_kwh`.
    pub previous_bill: f64,
    /// `previous_bill - current_bill`; positive means money saved.
    pub savings_amount: f64,
    /// `total_energy_kwh - previous_total_kwh`.
    pub delta_kwh: f64,
    /// Previous-period energy (kWh).
    pub previous_total_kwh: f64,
    /// Previous-period energy per device (kWh).
    pub previous_device_wise_energy_kwh: BTreeMap<String, f64>,
    /// Latest observed timestamp; `None` for an empty dataset.
    pub anchor: Option<NaiveDateTime>,
    /// Current period bounds.
    pub current_period: Option<Period>,
    /// Previous period bounds.
    pub previous_period: Option<Period>,
    /// Distinct calendar days with readings in the current period.
    pub current_window_days: usize,
    /// Lifetime energy over lifetime distinct days (kWh/day).
    pub lifetime_daily_rate_kwh: f64,
    /// Device with the largest period-over-period increase.
    pub primary_driver: Option<PrimaryDriver>,
    /// Currency of every bill amount.
    pub currency: String,
}

impl MetricsSnapshot {
    /// The snapshot for a dataset with no readings.
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            total_energy_kwh: 0.0,
            active_device_count: 0,
            device_wise_energy_kwh: BTreeMap::new(),
            night_usage_percent: 0.0,
            current_bill: 0.0,
            previous_bill: 0.0,
            savings_amount: 0.0,
            delta_kwh: 0.0,
            previous_total_kwh: 0.0,
            previous_device_wise_energy_kwh: BTreeMap::new(),
            anchor: None,
            current_period: None,
            previous_period: None,
            current_window_days: 0,
            lifetime_daily_rate_kwh: 0.0,
            primary_driver: None,
            currency: currency.into(),
        }
    }

    /// Device with the highest current-period energy. Ties go to the name
    /// that sorts first.
    pub fn dominant_device(&self) -> Option<(&str, f64)> {
        self.device_wise_energy_kwh
            .iter()
            .fold(None::<(&str, f64)>, |best, (name, &kwh)| match best {
                Some((_, b)) if b >= kwh => best,
                _ => Some((name.as_str(), kwh)),
            })
    }

    /// Device with the lowest current-period energy. Ties go to the name that
    /// sorts first.
    pub fn least_device(&self) -> Option<(&str, f64)> {
        self.device_wise_energy_kwh
            .iter()
            .fold(None::<(&str, f64)>, |best, (name, &kwh)| match best {
                Some((_, b)) if b <= kwh => best,
                _ => Some((name.as_str(), kwh)),
            })
    }

    /// Share of the current total used by `kwh`, in percent (2 dp).
    pub fn share_percent(&self, kwh: f64) -> f64 {
        round2(100.0 * ratio_or_zero(kwh, self.total_energy_kwh))
    }

    /// Estimated monthly saving from bringing night-time usage under
    /// [`NIGHT_USAGE_TARGET_PERCENT`].
    pub fn night_shift_savings(&self) -> f64 {
        round2(self.current_bill * NIGHT_SHIFT_SAVINGS_SHARE)
    }

    /// Current-period daily rate (kWh/day) over days that have readings.
    pub fn current_daily_rate_kwh(&self) -> f64 {
        ratio_or_zero(self.total_energy_kwh, self.current_window_days as f64)
    }

    /// Case-insensitive lookup of a device's current-period energy.
    pub fn device_energy(&self, name: &str) -> Option<(&str, f64)> {
        self.device_wise_energy_kwh
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Energy Metrics ---")?;
        match (&self.anchor, &self.current_period) {
            (Some(anchor), Some(p)) => writeln!(f, "Period:            {} .. {anchor}", p.start)?,
            _ => writeln!(f, "Period:            (no data)")?,
        }
        writeln!(f, "Total energy:      {:.2} kWh", self.total_energy_kwh)?;
        writeln!(f, "Previous period:   {:.2} kWh", self.previous_total_kwh)?;
        writeln!(f, "Delta:             {:+.2} kWh", self.delta_kwh)?;
        writeln!(f, "Active devices:    {}", self.active_device_count)?;
        for (device, kwh) in &self.device_wise_energy_kwh {
            writeln!(f, "  {device:<24} {kwh:>10.2} kWh")?;
        }
        writeln!(f, "Night usage:       {:.1}%", self.night_usage_percent)?;
        writeln!(f, "Current bill:      {:.2} {}", self.current_bill, self.currency)?;
        writeln!(f, "Previous bill:     {:.2} {}", self.previous_bill, self.currency)?;
        write!(f, "Savings:           {:.2} {}", self.savings_amount, self.currency)
    }
}
