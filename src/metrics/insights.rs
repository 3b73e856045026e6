//! Structured observations derived from a [`MetricsSnapshot`].

use std::fmt;

use serde::Serialize;

use super::snapshot::MetricsSnapshot;
use crate::data::numeric::{finite_or_zero, round2};

/// Whether the current daily rate exceeds the historical baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    High,
    Normal,
}

/// One observation, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Insight {
    /// Device with the largest share of the current period.
    DominantLoad {
        device: String,
        kwh: f64,
        percent: f64,
    },
    /// Current daily rate against the lifetime daily rate.
    ConsumptionStatus {
        status: UsageStatus,
        current_daily_rate_kwh: f64,
        historical_daily_rate_kwh: f64,
    },
    NightUsage {
        percent: f64,
    },
    /// Night-time energy relative to daytime energy, in percent.
    NightVsDay {
        night_percent: f64,
        day_percent: f64,
        change_percent: f64,
    },
    /// Device whose consumption rose the most since the previous period.
    PrimaryDriver {
        device: String,
        delta_kwh: f64,
    },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DominantLoad {
                device,
                kwh,
                percent,
            } => write!(
                f,
                "{device} is the dominant load at {kwh:.2} kWh ({percent:.1}% of total)"
            ),
            Self::ConsumptionStatus {
                status: UsageStatus::High,
                current_daily_rate_kwh,
                historical_daily_rate_kwh,
            } => write!(
                f,
                "Consumption is high: {current_daily_rate_kwh:.2} kWh/day \
                 vs {historical_daily_rate_kwh:.2} kWh/day usual"
            ),
            Self::ConsumptionStatus {
                status: UsageStatus::Normal,
                current_daily_rate_kwh,
                ..
            } => write!(f, "Consumption is normal at {current_daily_rate_kwh:.2} kWh/day"),
            Self::NightUsage { percent } => write!(f, "Night usage is {percent:.1}% of total"),
            Self::NightVsDay { change_percent, .. } if *change_percent >= 0.0 => {
                write!(f, "Night-time usage is {change_percent:.1}% above daytime usage")
            }
            Self::NightVsDay { change_percent, .. } => {
                let below = change_percent.abs();
                write!(f, "Night-time usage is {below:.1}% below daytime usage")
            }
            Self::PrimaryDriver { device, delta_kwh } => {
                write!(f, "{device} drove the increase (+{delta_kwh:.2} kWh vs previous period)")
            }
        }
    }
}

/// Builds [`Insight`]s from snapshot fields only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightFormatter {
    high_usage_margin: f64,
}

impl Default for InsightFormatter {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl InsightFormatter {
    /// `high_usage_margin` is the fraction above the historical rate at which
    /// consumption counts as high.
    pub fn new(high_usage_margin: f64) -> Self {
        Self {
            high_usage_margin: finite_or_zero(high_usage_margin).max(0.0),
        }
    }

    /// Returns the insights for `snapshot` in a fixed order: dominant load,
    /// consumption status, night usage, night vs day, primary driver.
    ///
    /// The dominant load is omitted when the total is zero. Night vs day
    /// needs some daytime energy to compare against. The primary driver only
    /// appears for a positive increase.
    pub fn insights(&self, snapshot: &MetricsSnapshot, historical_daily_rate: f64) -> Vec<Insight> {
        let mut out = Vec::with_capacity(5);

        let dominant = snapshot.dominant_device().filter(|_| snapshot.total_energy_kwh > 0.0);
        if let Some((device, kwh)) = dominant {
            out.push(Insight::DominantLoad {
                device: device.to_string(),
                kwh,
                percent: snapshot.share_percent(kwh),
            });
        }

        let current = round2(snapshot.current_daily_rate_kwh());
        let historical = round2(historical_daily_rate);
        let status = if current > historical * (1.0 + self.high_usage_margin) {
            UsageStatus::High
        } else {
            UsageStatus::Normal
        };
        out.push(Insight::ConsumptionStatus {
            status,
            current_daily_rate_kwh: current,
            historical_daily_rate_kwh: historical,
        });

        out.push(Insight::NightUsage {
            percent: snapshot.night_usage_percent,
        });

        let night = snapshot.night_usage_percent;
        let day = round2(100.0 - night);
        if snapshot.total_energy_kwh > 0.0 && day > 0.0 {
            out.push(Insight::NightVsDay {
                night_percent: night,
                day_percent: day,
                change_percent: round2((night - day) / day * 100.0),
            });
        }

        if let Some(driver) = snapshot.primary_driver.as_ref().filter(|d| d.delta_kwh > 0.0) {
            out.push(Insight::PrimaryDriver {
                device: driver.device.clone(),
                delta_kwh: driver.delta_kwh,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::metrics::window::PrimaryDriver;

    fn snapshot(devices: &[(&str, f64)], days: usize) -> MetricsSnapshot {
        let mut s = MetricsSnapshot::zero("INR");
        s.device_wise_energy_kwh = devices.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        s.total_energy_kwh = devices.iter().map(|(_, v)| v).sum();
        s.active_device_count = devices.len();
        s.current_window_days = days;
        s
    }

    #[test]
    fn zero_snapshot_skips_dominant_load() {
        let insights = InsightFormatter::default().insights(&MetricsSnapshot::zero("INR"), 0.0);
        assert_eq!(
            insights,
            vec![
                Insight::ConsumptionStatus {
                    status: UsageStatus::Normal,
                    current_daily_rate_kwh: 0.0,
                    historical_daily_rate_kwh: 0.0,
                },
                Insight::NightUsage { percent: 0.0 },
            ]
        );
    }

    #[test]
    fn dominant_load_reports_share() {
        let s = snapshot(&[("AC", 60.0), ("Fridge", 40.0)], 10);
        let insights = InsightFormatter::default().insights(&s, 10.0);
        assert_eq!(
            insights[0],
            Insight::DominantLoad {
                device: "AC".into(),
                kwh: 60.0,
                percent: 60.0,
            }
        );
    }

    #[test]
    fn status_uses_daily_rate_not_period_total() {
        // 100 kWh over 10 days is 10/day; a 9.5/day baseline is within margin
        let s = snapshot(&[("AC", 100.0)], 10);
        let f = InsightFormatter::default();
        let status = |rate| match &f.insights(&s, rate)[1] {
            Insight::ConsumptionStatus { status, .. } => *status,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(status(9.5), UsageStatus::Normal);
        assert_eq!(status(8.0), UsageStatus::High);
    }

    #[test]
    fn primary_driver_only_for_increase() {
        let mut s = snapshot(&[("AC", 10.0)], 1);
        s.primary_driver = Some(PrimaryDriver {
            device: "AC".into(),
            delta_kwh: -2.0,
            current_kwh: 10.0,
            previous_kwh: 12.0,
        });
        let f = InsightFormatter::default();
        assert!(!f.insights(&s, 10.0).iter().any(|i| matches!(i, Insight::PrimaryDriver { .. })));

        if let Some(d) = s.primary_driver.as_mut() {
            d.delta_kwh = 3.0;
        }
        assert_eq!(
            f.insights(&s, 10.0).last(),
            Some(&Insight::PrimaryDriver {
                device: "AC".into(),
                delta_kwh: 3.0,
            })
        );
    }

    #[test]
    fn night_vs_day_compares_shares() {
        let mut s = snapshot(&[("AC", 10.0)], 1);
        s.night_usage_percent = 60.0;
        let insights = InsightFormatter::default().insights(&s, 10.0);
        assert_eq!(
            insights[3],
            Insight::NightVsDay {
                night_percent: 60.0,
                day_percent: 40.0,
                change_percent: 50.0,
            }
        );
        assert_eq!(
            insights[3].to_string(),
            "Night-time usage is 50.0% above daytime usage"
        );

        s.night_usage_percent = 20.0;
        let insights = InsightFormatter::default().insights(&s, 10.0);
        assert_eq!(
            insights[3].to_string(),
            "Night-time usage is 75.0% below daytime usage"
        );
    }

    #[test]
    fn night_vs_day_needs_daytime_energy() {
        let mut s = snapshot(&[("AC", 10.0)], 1);
        s.night_usage_percent = 100.0;
        let insights = InsightFormatter::default().insights(&s, 10.0);
        assert!(!insights.iter().any(|i| matches!(i, Insight::NightVsDay { .. })));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Insight::NightUsage { percent: 12.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "night_usage", "percent": 12.5}));
    }

    #[test]
    fn display_is_readable() {
        let text = Insight::NightUsage { percent: 50.0 }.to_string();
        assert_eq!(text, "Night usage is 50.0% of total");
    }
}
