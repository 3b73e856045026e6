//! Float normalization applied before any value crosses a JSON boundary.

/// Returns `value` when finite, otherwise `0.0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Returns `value` when finite and non-negative, otherwise `0.0`.
pub fn non_negative_or_zero(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

/// Rounds to two decimals for presentation. Non-finite input maps to `0.0`.
///
/// # Examples
///
/// ```
/// use enverse::data::numeric::round2;
///
/// assert_eq!(round2(1.005_1), 1.01);
/// assert_eq!(round2(f64::NAN), 0.0);
/// ```
pub fn round2(value: f64) -> f64 {
    let rounded = (finite_or_zero(value) * 100.0).round() / 100.0;
    // avoid "-0.0" in serialized output
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Divides, returning `0.0` for a zero denominator or a non-finite result.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}
