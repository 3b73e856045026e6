//! Error taxonomy shared by the data source, billing, and the ML ports.

use thiserror::Error;

/// Failures that surface to the caller.
///
/// Degenerate numeric conditions (division by zero, non-finite results,
/// empty datasets) are absorbed into defaults and never appear here.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Backing dataset is missing or unreadable.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    /// Required columns are missing from the dataset header.
    #[error("schema error: {0}")]
    Schema(String),
    /// Caller passed a value outside the function's domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An external capability (forecast, estimation, classifier) failed.
    #[error("port error: {0}")]
    Port(String),
}

impl From<csv::Error> for MetricsError {
    fn from(e: csv::Error) -> Self {
        Self::DataUnavailable(e.to_string())
    }
}
