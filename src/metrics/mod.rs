//! Aggregation engine, its snapshot contract and the consumers that read it.

pub mod engine;
/// Structured observations from a snapshot.
pub mod insights;
pub mod snapshot;
/// Per-day series for charting.
pub mod timeline;
pub mod window;

pub use engine::MetricsEngine;
pub use insights::{Insight, InsightFormatter, UsageStatus};
pub use snapshot::MetricsSnapshot;
pub use timeline::{DailyUsage, TimelineReport, daily_series};
pub use window::{Period, Periods, PrimaryDriver, Windows};
