//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;

use enverse::billing::SlabTariff;
use enverse::data::DaytimeBand;
use enverse::io::CsvDataSource;
use enverse::metrics::MetricsEngine;
use tempfile::NamedTempFile;

/// Header of the ingestion schema, `energy_kwh` included.
pub const HEADER: &str =
    "timestamp,device_name,device_type,power_watts,duration_minutes,energy_kwh";

/// Writes `contents` to a fresh temporary CSV file.
///
/// The file is deleted when the returned handle drops.
pub fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file should be created");
    file.write_all(contents.as_bytes())
        .expect("temp file should be writable");
    file.flush().expect("temp file should flush");
    file
}

/// Builds a CSV body from `HEADER` and `rows`.
pub fn csv_with_rows(rows: &[&str]) -> String {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out
}

/// Engine over the CSV at `file` with the default tariff and 30-day periods.
pub fn csv_engine(file: &NamedTempFile) -> MetricsEngine<CsvDataSource> {
    MetricsEngine::new(
        CsvDataSource::new(file.path(), DaytimeBand::default()),
        SlabTariff::default(),
        30,
    )
}

/// A small household spanning two periods, anchored on 2025-12-31 20:00.
///
/// Previous period: AC 6 kWh, Fridge 4 kWh. Current period: AC 10 kWh,
/// Fridge 4 kWh, Lighting 1.5 kWh (derived from 250 W over 360 min).
pub fn household_csv() -> String {
    csv_with_rows(&[
        "2025-11-20 14:00:00,Air Conditioner,cooling,1500,240,6",
        "2025-11-20 23:00:00,Refrigerator,refrigeration,150,60,4",
        "2025-12-20 13:00:00,Air Conditioner,cooling,1500,240,6",
        "2025-12-28 22:00:00,Air Conditioner,cooling,1000,240,4",
        "2025-12-30 19:00:00,Lighting,lighting,250,360,",
        "2025-12-31 20:00:00,Refrigerator,refrigeration,150,60,4",
    ])
}
