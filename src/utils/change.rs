//! Period-over-period change arithmetic shared by the comparative analyzers.

/// Percentage change from `previous` to `current`.
///
/// A zero previous value yields 100 when the current value is positive and
/// 0 otherwise, so the result is always finite.
pub fn percentage_change(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else if current > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Change in average position, defined only when both sides are known.
///
/// Negative values mean the page moved to a numerically lower (better) position.
pub fn position_delta(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(p), Some(c)) if p.is_finite() && c.is_finite() => Some(c - p),
        _ => None,
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentage_change_zero_denominator() {
        assert_eq!(percentage_change(0.0, 0.0), 0.0);
        assert_eq!(percentage_change(0.0, 25.0), 100.0);
        assert_eq!(percentage_change(40.0, 0.0), -100.0);
    }

    #[test]
    fn percentage_change_regular() {
        assert_relative_eq!(percentage_change(1000.0, 1500.0), 50.0, epsilon = 1e-10);
        assert_relative_eq!(percentage_change(200.0, 150.0), -25.0, epsilon = 1e-10);
    }

    #[test]
    fn position_delta_requires_both_sides() {
        assert_eq!(position_delta(Some(5.0), Some(4.0)), Some(-1.0));
        assert_eq!(position_delta(None, Some(4.0)), None);
        assert_eq!(position_delta(Some(4.0), None), None);
        assert_eq!(position_delta(Some(f64::NAN), Some(4.0)), None);
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(12.34, 1), 12.3);
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(round_to(-3.75, 0), -4.0);
    }
}
