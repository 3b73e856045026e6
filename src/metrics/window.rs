//! Dataset-anchored current/previous periods and period-over-period
//! attribution.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::data::{Reading, Timeline};

/// A bounded time window. `start` is always inclusive; `end` is inclusive
/// only for the current period, whose end is the anchor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    /// Inclusive lower bound.
    pub start: NaiveDateTime,
    /// Upper bound.
    pub end: NaiveDateTime,
    /// Whether `end` belongs to the period.
    pub end_inclusive: bool,
}

impl Period {
    /// Whether `ts` falls inside the period.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && (ts < self.end || (self.end_inclusive && ts == self.end))
    }
}

/// The two periods derived from one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Periods {
    /// `[anchor - n days, anchor]`.
    pub current: Period,
    /// `[anchor - 2n days, anchor - n days)`.
    pub previous: Period,
}

impl Periods {
    /// Builds both periods from the latest observed timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use enverse::metrics::window::Periods;
    ///
    /// let anchor = NaiveDate::from_ymd_opt(2025, 12, 31)
    ///     .and_then(|d| d.and_hms_opt(23, 0, 0))
    ///     .unwrap();
    /// let p = Periods::anchored(anchor, 30);
    /// assert_eq!(p.current.start, p.previous.end);
    /// assert!(p.current.contains(p.current.start));
    /// assert!(!p.previous.contains(p.previous.end));
    /// ```
    ///
    /// Bounds that would fall before the earliest representable timestamp
    /// saturate to [`NaiveDateTime::MIN`].
    pub fn anchored(anchor: NaiveDateTime, period_days: i64) -> Self {
        let span = Duration::try_days(period_days).unwrap_or(Duration::MAX);
        let boundary = saturating_sub(anchor, span);
        Self {
            current: Period {
                start: boundary,
                end: anchor,
                end_inclusive: true,
            },
            previous: Period {
                start: saturating_sub(boundary, span),
                end: boundary,
                end_inclusive: false,
            },
        }
    }
}

/// `ts - span`, clamped to the earliest representable timestamp.
pub(crate) fn saturating_sub(ts: NaiveDateTime, span: Duration) -> NaiveDateTime {
    ts.checked_sub_signed(span).unwrap_or(NaiveDateTime::MIN)
}

/// Readings of a timeline split by period membership.
///
/// Both slices borrow from the timeline; since it is sorted, each period is
/// one contiguous run.
#[derive(Debug, Clone, Copy)]
pub struct Windows<'a> {
    /// Period bounds used for the split.
    pub periods: Periods,
    /// Readings in the current period.
    pub current: &'a [Reading],
    /// Readings in the previous period.
    pub previous: &'a [Reading],
}

/// Splits `timeline` into current and previous slices around `anchor`.
///
/// A reading stamped exactly `anchor - period_days` lands in the current
/// slice only.
pub fn split(timeline: &Timeline, anchor: NaiveDateTime, period_days: i64) -> Windows<'_> {
    let periods = Periods::anchored(anchor, period_days);
    let readings = timeline.readings();

    let prev_start = readings.partition_point(|r| r.timestamp < periods.previous.start);
    let boundary = readings.partition_point(|r| r.timestamp < periods.current.start);
    let cur_end = readings.partition_point(|r| r.timestamp <= periods.current.end);

    Windows {
        periods,
        current: &readings[boundary..cur_end.max(boundary)],
        previous: &readings[prev_start..boundary],
    }
}

/// Sums energy per device name, in full precision.
pub fn device_totals(readings: &[Reading]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for r in readings {
        *totals.entry(r.device_name.clone()).or_insert(0.0) += r.energy_kwh;
    }
    totals
}

/// Device whose consumption rose the most between two periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryDriver {
    /// Device name.
    pub device: String,
    /// `current_kwh - previous_kwh`.
    pub delta_kwh: f64,
    /// Current-period energy.
    pub current_kwh: f64,
    /// Previous-period energy (`0` when the device was absent).
    pub previous_kwh: f64,
}

/// Returns the device with the largest `current - previous` delta over the
/// union of both maps, a device missing from one side counting as `0`.
///
/// Ties go to the larger current-period energy, then to the name that sorts
/// first. `None` only when both maps are empty.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use enverse::metrics::window::primary_driver;
///
/// let current = BTreeMap::from([("A".to_string(), 10.0), ("B".to_string(), 4.0)]);
/// let previous = BTreeMap::from([("A".to_string(), 6.0), ("B".to_string(), 4.0)]);
/// let driver = primary_driver(&current, &previous).unwrap();
/// assert_eq!(driver.device, "A");
/// assert_eq!(driver.delta_kwh, 4.0);
/// ```
pub fn primary_driver(
    current: &BTreeMap<String, f64>,
    previous: &BTreeMap<String, f64>,
) -> Option<PrimaryDriver> {
    let devices: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();

    let mut best: Option<PrimaryDriver> = None;
    for device in devices {
        let cur = current.get(device).copied().unwrap_or(0.0);
        let prev = previous.get(device).copied().unwrap_or(0.0);
        let candidate = PrimaryDriver {
            device: device.clone(),
            delta_kwh: cur - prev,
            current_kwh: cur,
            previous_kwh: prev,
        };
        let replace = match &best {
            None => true,
            Some(b) => {
                candidate.delta_kwh > b.delta_kwh
                    || (candidate.delta_kwh == b.delta_kwh && candidate.current_kwh > b.current_kwh)
            }
        };
        if replace {
            best = Some(candidate);
        }
    }
    best
}
