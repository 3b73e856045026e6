//! Dataset input and output.

use std::sync::Arc;

use crate::config::AppConfig;

/// Synthetic household dataset.
pub mod demo;
pub mod export;
/// Timeline loading and validation.
pub mod source;

pub use demo::DemoDataSource;
pub use source::{CsvDataSource, DataSource, InMemorySource};

/// Builds the source selected by `[data] source`.
///
/// Anything other than `"demo"` reads the CSV at `[data] path`; run
/// [`AppConfig::validate`] first to reject unknown kinds.
pub fn source_from_config(config: &AppConfig) -> Arc<dyn DataSource + Send + Sync> {
    let band = config.daytime.band();
    match config.data.source.as_str() {
        "demo" => Arc::new(DemoDataSource::new(config.demo.seed, config.demo.days, band)),
        _ => Arc::new(CsvDataSource::new(config.data.path.clone(), band)),
    }
}
