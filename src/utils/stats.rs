//! Descriptive statistics over metric samples.
//!
//! Every helper returns `None` when the sample is too small for the
//! statistic to be defined, so callers decide how an absent value reads.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sum_sq_dev(values: &[f64], center: f64) -> f64 {
    values.iter().map(|v| (v - center) * (v - center)).sum()
}

/// Population variance (`n` denominator), used for decomposition strength.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(sum_sq_dev(values, m) / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator); needs two observations.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some((sum_sq_dev(values, m) / (values.len() - 1) as f64).sqrt())
}

/// Median; an even-sized sample averages the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Least-squares line through `(x, y)` points, returned as `(intercept, slope)`.
///
/// `None` for fewer than two points or a degenerate x range.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x)?;
    let my = mean(y)?;

    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            (sxy + (xi - mx) * (yi - my), sxx + (xi - mx) * (xi - mx))
        });
    if sxx < 1e-12 {
        return None;
    }
    let slope = sxy / sxx;
    Some((my - slope * mx, slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_samples_have_no_statistics() {
        assert!(mean(&[]).is_none());
        assert!(median(&[]).is_none());
        assert!(population_variance(&[]).is_none());
        assert!(sample_std_dev(&[4.0]).is_none());
    }

    #[test]
    fn positions_summarize() {
        let positions = [3.0, 4.0, 5.0, 6.0, 7.0];
        assert_relative_eq!(mean(&positions).unwrap(), 5.0, epsilon = 1e-10);
        assert_relative_eq!(population_variance(&positions).unwrap(), 2.0, epsilon = 1e-10);
        assert_relative_eq!(sample_std_dev(&positions).unwrap(), 2.5_f64.sqrt(), epsilon = 1e-10);
        assert_eq!(population_variance(&[7.0]), Some(0.0));
    }

    #[test]
    fn median_of_ctrs() {
        assert_relative_eq!(median(&[0.05, 0.01, 0.03]).unwrap(), 0.03, epsilon = 1e-12);
        assert_relative_eq!(median(&[0.04, 0.01, 0.02, 0.03]).unwrap(), 0.025, epsilon = 1e-12);
    }

    #[test]
    fn linear_fit_recovers_trend() {
        let days: Vec<f64> = (0..14).map(f64::from).collect();
        let impressions: Vec<f64> = days.iter().map(|d| 120.0 + 4.0 * d).collect();
        let (intercept, slope) = linear_fit(&days, &impressions).unwrap();
        assert_relative_eq!(intercept, 120.0, epsilon = 1e-9);
        assert_relative_eq!(slope, 4.0, epsilon = 1e-9);

        assert!(linear_fit(&[1.0], &[2.0]).is_none());
        assert!(linear_fit(&[3.0, 3.0], &[2.0, 5.0]).is_none());
    }
}
