//! Progressive slab (tiered) electricity billing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::numeric::round2;
use crate::error::MetricsError;

/// One pricing block of a slab tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slab {
    /// Units covered by this slab; `None` marks the unbounded final slab.
    #[serde(default)]
    pub width_kwh: Option<f64>,
    /// Price per unit inside this slab.
    pub rate: f64,
}

impl Slab {
    /// A bounded slab of `width_kwh` units at `rate`.
    pub fn bounded(width_kwh: f64, rate: f64) -> Self {
        Self {
            width_kwh: Some(width_kwh),
            rate,
        }
    }

    /// The unbounded remainder slab at `rate`.
    pub fn unbounded(rate: f64) -> Self {
        Self {
            width_kwh: None,
            rate,
        }
    }
}

/// Ordered list of slabs plus the currency the amounts are in.
///
/// # Examples
///
/// ```
/// use enverse::billing::SlabTariff;
///
/// let tariff = SlabTariff::default();
/// assert_eq!(tariff.bill(100.0).ok(), Some(300.0));
/// assert_eq!(tariff.bill(250.0).ok(), Some(1200.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabTariff {
    /// Slabs walked in order.
    pub slabs: Vec<Slab>,
    /// ISO currency code of every amount.
    pub currency: String,
}

impl Default for SlabTariff {
    /// Domestic three-slab tariff: 100 @ 3, next 100 @ 5, remainder @ 8.
    fn default() -> Self {
        Self {
            slabs: vec![
                Slab::bounded(100.0, 3.0),
                Slab::bounded(100.0, 5.0),
                Slab::unbounded(8.0),
            ],
            currency: "INR".to_string(),
        }
    }
}

/// Charge accrued inside a single slab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlabCharge {
    /// Units billed in this slab.
    pub units_kwh: f64,
    /// Slab rate.
    pub rate: f64,
    /// `units_kwh * rate`.
    pub amount: f64,
}

/// Itemized bill for a consumption figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillBreakdown {
    /// Units billed (rounded to 2 dp).
    pub units_kwh: f64,
    /// Total amount (rounded to 2 dp).
    pub amount: f64,
    /// Currency code.
    pub currency: String,
    /// Per-slab charges; slabs with no units are omitted.
    pub lines: Vec<SlabCharge>,
}

impl SlabTariff {
    /// Creates a tariff from explicit slabs.
    pub fn new(slabs: Vec<Slab>, currency: impl Into<String>) -> Self {
        Self {
            slabs,
            currency: currency.into(),
        }
    }

    /// Amount owed for `kwh` units.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidArgument`] when `kwh` is negative or
    /// not finite.
    pub fn bill(&self, kwh: f64) -> Result<f64, MetricsError> {
        Ok(self.breakdown(kwh)?.amount)
    }

    /// Amount owed for `kwh` units, itemized per slab.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidArgument`] when `kwh` is negative or
    /// not finite.
    pub fn breakdown(&self, kwh: f64) -> Result<BillBreakdown, MetricsError> {
        if !kwh.is_finite() || kwh < 0.0 {
            return Err(MetricsError::InvalidArgument(format!(
                "billable units must be a non-negative number, got {kwh}"
            )));
        }

        let mut remaining = kwh;
        let mut total = 0.0_f64;
        let mut lines = Vec::new();
        let last = self.slabs.len().saturating_sub(1);

        for (i, slab) in self.slabs.iter().enumerate() {
            if remaining <= 0.0 {
                break;
            }
            // the final slab absorbs the remainder whatever its width says
            let units = match slab.width_kwh {
                Some(width) if i < last => remaining.min(width),
                _ => remaining,
            };
            let amount = units * slab.rate;
            total += amount;
            remaining -= units;
            lines.push(SlabCharge {
                units_kwh: round2(units),
                rate: slab.rate,
                amount: round2(amount),
            });
        }

        Ok(BillBreakdown {
            units_kwh: round2(kwh),
            amount: round2(total),
            currency: self.currency.clone(),
            lines,
        })
    }

    /// Describes every structural problem with the slab list.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.slabs.is_empty() {
            out.push("at least one slab is required".to_string());
        }
        let last = self.slabs.len().saturating_sub(1);
        for (i, slab) in self.slabs.iter().enumerate() {
            if !slab.rate.is_finite() || slab.rate < 0.0 {
                out.push(format!("slab {i}: rate must be a finite number >= 0"));
            }
            match slab.width_kwh {
                Some(w) if !w.is_finite() || w <= 0.0 => {
                    out.push(format!("slab {i}: width_kwh must be > 0"));
                }
                Some(_) if i == last => {
                    out.push(format!("slab {i}: the final slab must be unbounded"));
                }
                None if i < last => {
                    out.push(format!("slab {i}: only the final slab may be unbounded"));
                }
                _ => {}
            }
        }
        out
    }
}

impl fmt::Display for BillBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Bill ---")?;
        for line in &self.lines {
            writeln!(
                f,
                "{:>10.2} kWh @ {:<6.2} = {:>10.2} {}",
                line.units_kwh, line.rate, line.amount, self.currency
            )?;
        }
        write!(
            f,
            "Total: {:.2} kWh -> {:.2} {}",
            self.units_kwh, self.amount, self.currency
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn bill(kwh: f64) -> f64 {
        SlabTariff::default().bill(kwh).unwrap()
    }

    #[test]
    fn tier_boundaries_match_reference_rates() {
        assert_eq!(bill(0.0), 0.0);
        assert_eq!(bill(100.0), 300.0);
        assert_eq!(bill(200.0), 800.0);
        assert_eq!(bill(250.0), 1200.0);
    }

    #[test]
    fn excess_past_boundary_uses_next_rate() {
        // 100 @ 3 + 0.0001 @ 5, rounded at presentation
        let b = SlabTariff::default().breakdown(100.0001).unwrap();
        assert_eq!(b.lines.len(), 2);
        assert_eq!(b.lines[1].rate, 5.0);
        assert_eq!(b.amount, 300.0);
        assert!(bill(100.01) > bill(100.0));
        assert!((bill(200.5) - 804.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_over_random_pairs() {
        let tariff = SlabTariff::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let a: f64 = rng.random_range(0.0..600.0);
            let b: f64 = rng.random_range(0.0..600.0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let (bl, bh) = (tariff.bill(lo).unwrap(), tariff.bill(hi).unwrap());
            assert!(bl <= bh, "bill({lo}) = {bl} > bill({hi}) = {bh}");
        }
    }

    #[test]
    fn negative_and_non_finite_input_rejected() {
        let tariff = SlabTariff::default();
        assert!(matches!(tariff.bill(-1.0), Err(MetricsError::InvalidArgument(_))));
        assert!(matches!(tariff.bill(f64::NAN), Err(MetricsError::InvalidArgument(_))));
    }

    #[test]
    fn n_tier_tariff_walks_in_order() {
        let tariff = SlabTariff::new(
            vec![
                Slab::bounded(50.0, 1.0),
                Slab::bounded(50.0, 2.0),
                Slab::bounded(50.0, 4.0),
                Slab::unbounded(10.0),
            ],
            "EUR",
        );
        // 50*1 + 50*2 + 50*4 + 10*10
        assert_eq!(tariff.bill(160.0).unwrap(), 450.0);
        assert!(tariff.problems().is_empty());
    }

    #[test]
    fn breakdown_omits_untouched_slabs() {
        let b = SlabTariff::default().breakdown(40.0).unwrap();
        assert_eq!(b.lines.len(), 1);
        assert_eq!(b.lines[0].amount, 120.0);
        assert_eq!(b.currency, "INR");
    }

    #[test]
    fn problems_flags_bad_slab_layouts() {
        let empty = SlabTariff::new(Vec::new(), "INR");
        assert_eq!(empty.problems().len(), 1);

        let unbounded_middle =
            SlabTariff::new(vec![Slab::unbounded(1.0), Slab::unbounded(2.0)], "INR");
        assert!(!unbounded_middle.problems().is_empty());

        let bounded_last = SlabTariff::new(vec![Slab::bounded(10.0, 1.0)], "INR");
        assert!(!bounded_last.problems().is_empty());
    }
}
