//! What-if energy estimation and its attribution.

use serde::{Deserialize, Serialize};

use crate::data::WATT_MINUTES_PER_KWH;
use crate::data::numeric::{finite_or_zero, non_negative_or_zero};
use crate::error::MetricsError;

/// A hypothetical appliance run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimationFeatures {
    /// Rated power (W).
    pub power_watts: f64,
    /// Run time (minutes).
    pub duration_minutes: f64,
    /// Fraction of rated power drawn on average; 1 when omitted.
    #[serde(default)]
    pub duty_cycle: Option<f64>,
}

impl EstimationFeatures {
    fn validate(&self) -> Result<(), MetricsError> {
        let fields = [
            ("power_watts", self.power_watts),
            ("duration_minutes", self.duration_minutes),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(MetricsError::InvalidArgument(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Duty cycle clamped into `[0, 1]`; a non-finite value counts as 1.
    pub fn effective_duty_cycle(&self) -> f64 {
        match self.duty_cycle {
            Some(d) if d.is_finite() => d.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}

/// One named share of an estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: String,
    pub kwh: f64,
}

/// An estimate with the shares that add up to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub estimated_kwh: f64,
    pub contributions: Vec<Contribution>,
}

/// Estimates the energy of a what-if run (kWh).
pub trait EstimationPort: Send + Sync {
    /// # Errors
    ///
    /// [`MetricsError::InvalidArgument`] for negative or non-finite inputs,
    /// [`MetricsError::Port`] when the backing model fails.
    fn predict(&self, features: &EstimationFeatures) -> Result<f64, MetricsError>;
}

/// Estimates with a per-feature breakdown.
pub trait ExplainPort: Send + Sync {
    /// # Errors
    ///
    /// Same as [`EstimationPort::predict`].
    fn predict_with_attribution(
        &self,
        features: &EstimationFeatures,
    ) -> Result<Explanation, MetricsError>;
}

/// Rated power times run time, scaled by the duty cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicsEstimator;

fn round4(value: f64) -> f64 {
    (finite_or_zero(value) * 10_000.0).round() / 10_000.0
}

impl EstimationPort for PhysicsEstimator {
    fn predict(&self, features: &EstimationFeatures) -> Result<f64, MetricsError> {
        features.validate()?;
        let rated = features.power_watts * features.duration_minutes / WATT_MINUTES_PER_KWH;
        Ok(round4(non_negative_or_zero(rated * features.effective_duty_cycle())))
    }
}

impl ExplainPort for PhysicsEstimator {
    /// `rated_load` is the full-power energy; `duty_cycle` is the (non-positive)
    /// correction for running below rated power. They sum to the estimate.
    fn predict_with_attribution(
        &self,
        features: &EstimationFeatures,
    ) -> Result<Explanation, MetricsError> {
        let estimated = self.predict(features)?;
        let rated = round4(features.power_watts * features.duration_minutes / WATT_MINUTES_PER_KWH);
        Ok(Explanation {
            estimated_kwh: estimated,
            contributions: vec![
                Contribution {
                    feature: "rated_load".into(),
                    kwh: rated,
                },
                Contribution {
                    feature: "duty_cycle".into(),
                    kwh: round4(estimated - rated),
                },
            ],
        })
    }
}
