//! Per-day series of the current window for charting.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::snapshot::MetricsSnapshot;
use super::window::PrimaryDriver;
use crate::data::Timeline;
use crate::data::numeric::round2;

/// Energy used on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub energy_kwh: f64,
    pub night_energy_kwh: f64,
}

/// Daily series plus the driver explaining the period change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineReport {
    /// Days with readings, oldest first.
    pub days: Vec<DailyUsage>,
    pub primary_driver: Option<PrimaryDriver>,
}

/// Sums the readings inside the snapshot's current period per calendar day.
///
/// The period bounds and the primary driver are taken from `snapshot`, so
/// the series always covers exactly what the snapshot aggregated.
pub fn daily_series(timeline: &Timeline, snapshot: &MetricsSnapshot) -> TimelineReport {
    let Some(period) = snapshot.current_period else {
        return TimelineReport {
            days: Vec::new(),
            primary_driver: None,
        };
    };

    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in timeline.readings().iter().filter(|r| period.contains(r.timestamp)) {
        let entry = days.entry(r.timestamp.date()).or_insert((0.0, 0.0));
        entry.0 += r.energy_kwh;
        if r.is_night {
            entry.1 += r.energy_kwh;
        }
    }

    TimelineReport {
        days: days
            .into_iter()
            .map(|(date, (energy, night))| DailyUsage {
                date,
                energy_kwh: round2(energy),
                night_energy_kwh: round2(night),
            })
            .collect(),
        primary_driver: snapshot.primary_driver.clone(),
    }
}
