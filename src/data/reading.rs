//! A single device reading and the day/night rule.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::numeric::non_negative_or_zero;

/// Divisor turning `watts * minutes` into kWh.
pub const WATT_MINUTES_PER_KWH: f64 = 60_000.0;

/// Inclusive band of daytime hours; every other hour counts as night.
///
/// # Examples
///
/// ```
/// use enverse::data::DaytimeBand;
///
/// let band = DaytimeBand::default();
/// assert!(!band.is_night(6));
/// assert!(!band.is_night(18));
/// assert!(band.is_night(19));
/// assert!(band.is_night(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaytimeBand {
    /// First daytime hour (inclusive).
    pub start_hour: u32,
    /// Last daytime hour (inclusive).
    pub end_hour: u32,
}

impl Default for DaytimeBand {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 18,
        }
    }
}

impl DaytimeBand {
    /// Returns `true` when `hour` falls outside `[start_hour, end_hour]`.
    pub fn is_night(&self, hour: u32) -> bool {
        hour < self.start_hour || hour > self.end_hour
    }
}

/// One timestamped power/energy observation for a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Instant the reading was taken (dataset-local time).
    pub timestamp: NaiveDateTime,
    /// Device identifier; many readings share one name.
    pub device_name: String,
    /// Coarse category, used by alert thresholds only.
    pub device_type: String,
    /// Average power drawn over the interval (W, >= 0).
    pub power_watts: f64,
    /// Sampling interval the reading covers (minutes, >= 0).
    pub duration_minutes: f64,
    /// Energy consumed over the interval (kWh, >= 0).
    pub energy_kwh: f64,
    /// Whether the reading falls outside the daytime band.
    pub is_night: bool,
}

impl Reading {
    /// Builds a reading, normalizing every numeric field and deriving the
    /// night flag from `band`.
    ///
    /// When `energy_kwh` is `None` the energy is derived from power and
    /// duration.
    pub fn new(
        timestamp: NaiveDateTime,
        device_name: impl Into<String>,
        device_type: impl Into<String>,
        power_watts: f64,
        duration_minutes: f64,
        energy_kwh: Option<f64>,
        band: &DaytimeBand,
    ) -> Self {
        let power_watts = non_negative_or_zero(power_watts);
        let duration_minutes = non_negative_or_zero(duration_minutes);
        let energy_kwh = match energy_kwh {
            Some(kwh) => non_negative_or_zero(kwh),
            None => derive_energy_kwh(power_watts, duration_minutes),
        };
        Self {
            timestamp,
            device_name: device_name.into(),
            device_type: device_type.into(),
            power_watts,
            duration_minutes,
            energy_kwh,
            is_night: band.is_night(timestamp.hour()),
        }
    }

    /// Overrides the derived night flag with a value supplied by the source.
    pub fn with_night_flag(mut self, is_night: bool) -> Self {
        self.is_night = is_night;
        self
    }

    /// Re-applies the numeric invariants (finite, non-negative).
    pub(crate) fn sanitize(&mut self) {
        self.power_watts = non_negative_or_zero(self.power_watts);
        self.duration_minutes = non_negative_or_zero(self.duration_minutes);
        self.energy_kwh = non_negative_or_zero(self.energy_kwh);
    }
}

/// Energy implied by a constant draw of `power_watts` for `duration_minutes`.
pub fn derive_energy_kwh(power_watts: f64, duration_minutes: f64) -> f64 {
    non_negative_or_zero(power_watts * duration_minutes / WATT_MINUTES_PER_KWH)
}
