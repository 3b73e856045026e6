//! Household energy metrics: one aggregation engine, slab billing, and the
//! insight, chat and alert consumers that read its snapshot.

pub mod alerts;
pub mod anomaly;
#[cfg(feature = "api")]
pub mod api;
pub mod billing;
pub mod config;
/// Readings, timelines and float normalization.
pub mod data;
pub mod error;
pub mod estimate;
pub mod forecast;
pub mod io;
/// Aggregation engine, windowing, snapshot and insights.
pub mod metrics;
pub mod nlq;

pub use error::MetricsError;
