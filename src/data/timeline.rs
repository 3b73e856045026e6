//! Immutable, timestamp-ordered collection of readings.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use super::reading::Reading;

/// Ordered snapshot of every reading in the backing dataset.
///
/// Constructed once per computation; there is no way to mutate the readings
/// after construction, so every consumer of one `Timeline` sees the same data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    readings: Vec<Reading>,
}

impl Timeline {
    /// Sorts `readings` by timestamp (stable, so equal timestamps keep file
    /// order) and re-applies the numeric invariants.
    pub fn new(mut readings: Vec<Reading>) -> Self {
        for r in &mut readings {
            r.sanitize();
        }
        readings.sort_by_key(|r| r.timestamp);
        Self { readings }
    }

    /// A timeline with no readings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All readings, oldest first.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the timeline holds no readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Latest observed timestamp, the anchor for every period.
    pub fn anchor(&self) -> Option<NaiveDateTime> {
        self.readings.last().map(|r| r.timestamp)
    }

    /// Energy summed over the whole timeline (kWh, full precision).
    pub fn total_energy_kwh(&self) -> f64 {
        self.readings.iter().map(|r| r.energy_kwh).sum()
    }

    /// Lifetime daily rate: total energy over the number of distinct
    /// calendar days with at least one reading. `0.0` when empty.
    pub fn daily_rate_kwh(&self) -> f64 {
        let days = distinct_days(&self.readings);
        if days == 0 {
            return 0.0;
        }
        self.total_energy_kwh() / days as f64
    }
}

/// Number of distinct calendar days covered by `readings`.
pub fn distinct_days(readings: &[Reading]) -> usize {
    readings
        .iter()
        .map(|r| r.timestamp.date())
        .collect::<BTreeSet<NaiveDate>>()
        .len()
}
