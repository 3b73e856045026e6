//! Loading and validating the reading timeline.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::data::{DaytimeBand, Reading, Timeline};
use crate::error::MetricsError;

/// Columns every dataset must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "timestamp",
    "device_name",
    "power_watts",
    "duration_minutes",
];

/// Device type used when the dataset has no `device_type` column.
pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

/// Anything that can deliver a complete, self-consistent timeline.
pub trait DataSource {
    /// Loads the full timeline.
    ///
    /// # Errors
    ///
    /// [`MetricsError::DataUnavailable`] when the backing data cannot be read,
    /// [`MetricsError::Schema`] when required columns are missing. An empty
    /// dataset is not an error.
    fn load(&self) -> Result<Timeline, MetricsError>;
}

impl<S: DataSource + ?Sized> DataSource for &S {
    fn load(&self) -> Result<Timeline, MetricsError> {
        (**self).load()
    }
}

impl<S: DataSource + ?Sized> DataSource for std::sync::Arc<S> {
    fn load(&self) -> Result<Timeline, MetricsError> {
        (**self).load()
    }
}

/// A fixed timeline, handy for tests and for callers that already hold one.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    timeline: Timeline,
}

impl InMemorySource {
    /// Wraps `readings` in a timeline.
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            timeline: Timeline::new(readings),
        }
    }
}

impl DataSource for InMemorySource {
    fn load(&self) -> Result<Timeline, MetricsError> {
        Ok(self.timeline.clone())
    }
}

/// CSV file with one reading per row.
///
/// Columns: `timestamp, device_name, device_type, power_watts,
/// duration_minutes[, energy_kwh][, is_night]`. Column names are matched
/// case-insensitively; extra columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
    band: DaytimeBand,
}

impl CsvDataSource {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>, band: DaytimeBand) -> Self {
        Self {
            path: path.into(),
            band,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvDataSource {
    fn load(&self) -> Result<Timeline, MetricsError> {
        // whole file in one read so a concurrent rewrite can't tear the snapshot
        let bytes = fs::read(&self.path).map_err(|e| {
            MetricsError::DataUnavailable(format!("cannot read \"{}\": {e}", self.path.display()))
        })?;
        let timeline = parse_csv(&bytes, &self.band)?;
        debug!(
            path = %self.path.display(),
            readings = timeline.len(),
            "timeline loaded"
        );
        Ok(timeline)
    }
}

/// Parses CSV bytes into a timeline.
///
/// Rows whose timestamp does not parse are dropped; numeric cells that do not
/// parse become `0`.
///
/// # Errors
///
/// [`MetricsError::Schema`] when a required column is absent,
/// [`MetricsError::DataUnavailable`] when the header itself is unreadable.
pub fn parse_csv(bytes: &[u8], band: &DaytimeBand) -> Result<Timeline, MetricsError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Timeline::empty());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_ascii_lowercase(), i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !index.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(MetricsError::Schema(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let col = |name: &str| index.get(name).copied();
    let (ts_i, name_i, power_i, dur_i) = (
        col("timestamp"),
        col("device_name"),
        col("power_watts"),
        col("duration_minutes"),
    );
    let (type_i, energy_i, night_i) = (col("device_type"), col("energy_kwh"), col("is_night"));

    let mut readings = Vec::new();
    let mut dropped = 0_usize;

    for record in rdr.records() {
        let Ok(record) = record else {
            dropped += 1;
            continue;
        };
        let cell = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or("");

        let Some(timestamp) = parse_timestamp(cell(ts_i)) else {
            dropped += 1;
            continue;
        };

        let device_type = match cell(type_i) {
            "" => UNKNOWN_DEVICE_TYPE,
            t => t,
        };
        let energy = match cell(energy_i) {
            "" => None,
            raw => Some(coerce_number(raw)),
        };

        let mut reading = Reading::new(
            timestamp,
            cell(name_i),
            device_type,
            coerce_number(cell(power_i)),
            coerce_number(cell(dur_i)),
            energy,
            band,
        );
        if let Some(flag) = parse_flag(cell(night_i)) {
            reading = reading.with_night_flag(flag);
        }
        readings.push(reading);
    }

    if dropped > 0 {
        warn!(dropped, kept = readings.len(), "dropped rows with unparseable timestamps");
    }

    Ok(Timeline::new(readings))
}

/// Parses a number, mapping anything unparseable or non-finite to `0`.
pub fn coerce_number(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parses the timestamp formats seen in exported household datasets.
///
/// # Examples
///
/// ```
/// use enverse::io::source::parse_timestamp;
///
/// assert!(parse_timestamp("2025-10-01 14:00").is_some());
/// assert!(parse_timestamp("2025-10-01T14:00:00Z").is_some());
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_any_format(raw).filter(|ts| SUPPORTED_YEARS.contains(&ts.year()))
}

/// Years a reading may carry; anything else is treated as unparseable.
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

fn parse_any_format(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M",
    ];
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
