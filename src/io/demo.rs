//! Deterministic synthetic household used by the `demo` preset.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::source::DataSource;
use crate::config::MAX_DEMO_DAYS;
use crate::data::{DaytimeBand, Reading, Timeline};
use crate::error::MetricsError;

/// Seed offset between consecutive appliances so their noise is uncorrelated.
const DEVICE_SEED_STRIDE: u64 = 57;

/// First timestamp of every generated dataset.
fn demo_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Usage pattern of one simulated appliance.
#[derive(Debug, Clone, Copy)]
struct Appliance {
    name: &'static str,
    device_type: &'static str,
    rated_watts: f64,
    /// Hours of the day (0–23) in which the appliance runs.
    on_hours: &'static [u32],
    /// Runs only on days where `day % every_n_days == 0`.
    every_n_days: u32,
    /// Standby draw as a fraction of rated power outside `on_hours`.
    standby: f64,
    /// Relative noise standard deviation.
    noise_std: f64,
}

const HOUSEHOLD: &[Appliance] = &[
    Appliance {
        name: "Air Conditioner",
        device_type: "cooling",
        rated_watts: 1500.0,
        on_hours: &[13, 14, 15, 16, 22, 23, 0, 1],
        every_n_days: 1,
        standby: 0.0,
        noise_std: 0.10,
    },
    Appliance {
        name: "Refrigerator",
        device_type: "refrigeration",
        rated_watts: 150.0,
        on_hours: &[],
        every_n_days: 1,
        standby: 0.6,
        noise_std: 0.05,
    },
    Appliance {
        name: "Washing Machine",
        device_type: "laundry",
        rated_watts: 500.0,
        on_hours: &[9, 10],
        every_n_days: 3,
        standby: 0.0,
        noise_std: 0.05,
    },
    Appliance {
        name: "Lighting",
        device_type: "lighting",
        rated_watts: 120.0,
        on_hours: &[6, 18, 19, 20, 21, 22],
        every_n_days: 1,
        standby: 0.0,
        noise_std: 0.05,
    },
    Appliance {
        name: "Electronics",
        device_type: "electronics",
        rated_watts: 250.0,
        on_hours: &[8, 19, 20, 21, 22, 23],
        every_n_days: 1,
        standby: 0.02,
        noise_std: 0.08,
    },
];

/// Hourly readings for a fixed five-appliance household.
///
/// The same `seed` and `days` always produce the same timeline, so loading
/// twice yields equal data.
#[derive(Debug, Clone)]
pub struct DemoDataSource {
    seed: u64,
    days: u32,
    band: DaytimeBand,
}

impl DemoDataSource {
    /// Creates a generator for `days` days of hourly data, capped at
    /// [`MAX_DEMO_DAYS`].
    pub fn new(seed: u64, days: u32, band: DaytimeBand) -> Self {
        Self {
            seed,
            days: days.min(MAX_DEMO_DAYS),
            band,
        }
    }

    /// Generates the timeline.
    pub fn generate(&self) -> Timeline {
        let start = demo_epoch();
        let hours = i64::from(self.days) * 24;
        let mut readings = Vec::with_capacity(hours as usize * HOUSEHOLD.len());

        for (i, appliance) in HOUSEHOLD.iter().enumerate() {
            let mut rng =
                StdRng::seed_from_u64(self.seed.wrapping_add(DEVICE_SEED_STRIDE * i as u64));
            for h in 0..hours {
                let ts = start + Duration::hours(h);
                let day = (h / 24) as u32;
                let watts = appliance.power_watts(ts, day, &mut rng);
                readings.push(Reading::new(
                    ts,
                    appliance.name,
                    appliance.device_type,
                    watts,
                    60.0,
                    None,
                    &self.band,
                ));
            }
        }

        Timeline::new(readings)
    }
}

impl DataSource for DemoDataSource {
    fn load(&self) -> Result<Timeline, MetricsError> {
        Ok(self.generate())
    }
}

impl Appliance {
    fn power_watts(&self, ts: NaiveDateTime, day: u32, rng: &mut StdRng) -> f64 {
        let scheduled = day % self.every_n_days.max(1) == 0 && self.on_hours.contains(&ts.hour());
        let duty = if scheduled { 1.0 } else { self.standby };
        if duty == 0.0 {
            return 0.0;
        }
        let watts = self.rated_watts * (duty + gaussian_noise(rng, self.noise_std));
        watts.max(0.0)
    }
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
