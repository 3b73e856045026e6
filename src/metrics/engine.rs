//! The single aggregation path behind every dashboard, chat answer, timeline
//! and insight.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::snapshot::MetricsSnapshot;
use super::window::{self, Windows};
use crate::billing::SlabTariff;
use crate::config::AppConfig;
use crate::data::numeric::{finite_or_zero, ratio_or_zero, round2};
use crate::data::{Timeline, distinct_days};
use crate::error::MetricsError;
use crate::io::DataSource;

/// Computes [`MetricsSnapshot`]s from a data source.
///
/// The engine holds no mutable state: every call loads one timeline and
/// derives every field from it, so concurrent calls need no locking.
#[derive(Debug, Clone)]
pub struct MetricsEngine<S> {
    source: S,
    tariff: SlabTariff,
    period_days: i64,
}

impl<S: DataSource> MetricsEngine<S> {
    /// Loads the timeline once and computes its snapshot.
    ///
    /// # Errors
    ///
    /// Propagates [`MetricsError::DataUnavailable`] and
    /// [`MetricsError::Schema`] from the source. An empty dataset yields the
    /// zero snapshot.
    pub fn compute(&self) -> Result<MetricsSnapshot, MetricsError> {
        let timeline = self.load()?;
        Ok(self.compute_from(&timeline))
    }

    /// Loads the timeline the engine would aggregate, for callers that need
    /// the raw readings next to the snapshot (anomalies, daily series).
    ///
    /// # Errors
    ///
    /// Same as [`MetricsEngine::compute`].
    pub fn load(&self) -> Result<Timeline, MetricsError> {
        self.source.load()
    }
}

impl<S> MetricsEngine<S> {
    /// Creates an engine over `source`.
    pub fn new(source: S, tariff: SlabTariff, period_days: i64) -> Self {
        Self {
            source,
            tariff,
            period_days,
        }
    }

    /// Creates an engine with the tariff and period length from `config`.
    pub fn from_config(source: S, config: &AppConfig) -> Self {
        Self::new(source, config.billing.tariff(), config.windowing.period_days)
    }

    /// Tariff used for both bills.
    pub fn tariff(&self) -> &SlabTariff {
        &self.tariff
    }

    /// Current/previous split of `timeline` around its anchor, or `None` when
    /// it is empty.
    pub fn windows<'a>(&self, timeline: &'a Timeline) -> Option<Windows<'a>> {
        timeline
            .anchor()
            .map(|anchor| window::split(timeline, anchor, self.period_days))
    }

    /// Computes the snapshot of an already loaded timeline.
    pub fn compute_from(&self, timeline: &Timeline) -> MetricsSnapshot {
        let Some(windows) = self.windows(timeline) else {
            debug!("empty timeline, returning zero snapshot");
            return MetricsSnapshot::zero(self.tariff.currency.clone());
        };

        // rounded per-device map is the one source of truth for the total
        let device_wise = rounded(window::device_totals(windows.current));
        let total = round2(device_wise.values().sum());

        let previous_device_wise = rounded(window::device_totals(windows.previous));
        let previous_total = round2(windows.previous.iter().map(|r| r.energy_kwh).sum());

        let current_bill = self.bill_or_zero(total);
        let previous_bill = self.bill_or_zero(previous_total);

        let night_kwh: f64 = windows
            .current
            .iter()
            .filter(|r| r.is_night)
            .map(|r| r.energy_kwh)
            .sum();
        let night_usage_percent = round2((100.0 * ratio_or_zero(night_kwh, total)).min(100.0));

        let primary_driver =
            window::primary_driver(&device_wise, &previous_device_wise).map(|mut d| {
                d.delta_kwh = round2(d.delta_kwh);
                d
            });

        let snapshot = MetricsSnapshot {
            total_energy_kwh: total,
            active_device_count: device_wise.len(),
            night_usage_percent,
            current_bill,
            previous_bill,
            savings_amount: round2(previous_bill - current_bill),
            delta_kwh: round2(total - previous_total),
            previous_total_kwh: previous_total,
            anchor: timeline.anchor(),
            current_period: Some(windows.periods.current),
            previous_period: Some(windows.periods.previous),
            current_window_days: distinct_days(windows.current),
            lifetime_daily_rate_kwh: round2(timeline.daily_rate_kwh()),
            primary_driver,
            currency: self.tariff.currency.clone(),
            device_wise_energy_kwh: device_wise,
            previous_device_wise_energy_kwh: previous_device_wise,
        };

        debug!(
            readings = timeline.len(),
            current = windows.current.len(),
            previous = windows.previous.len(),
            total_kwh = snapshot.total_energy_kwh,
            previous_kwh = snapshot.previous_total_kwh,
            "metrics computed"
        );
        snapshot
    }

    fn bill_or_zero(&self, kwh: f64) -> f64 {
        match self.tariff.bill(kwh) {
            Ok(amount) => finite_or_zero(amount),
            Err(e) => {
                warn!(error = %e, kwh, "billing failed, using 0");
                0.0
            }
        }
    }
}

fn rounded(totals: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    totals.into_iter().map(|(k, v)| (k, round2(v))).collect()
}
