//! Classical additive seasonal decomposition.
//!
//! The series is split into three components:
//! - Trend: a centered moving average over one full period, linearly
//!   extrapolated over the edges where the window is incomplete
//! - Seasonal: the per-position mean of the detrended series, centered on zero
//!   and repeated across the series
//! - Remainder: what is left after removing trend and seasonal

use crate::error::{AnalysisError, Result};
use crate::utils::{linear_fit, mean, population_variance};

/// Result of a classical decomposition.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Trend component.
    pub trend: Vec<f64>,
    /// Seasonal component (the figure repeated over the series).
    pub seasonal: Vec<f64>,
    /// Remainder component.
    pub remainder: Vec<f64>,
    /// One cycle of seasonal offsets; `figure[k]` applies to positions `i % period == k`.
    pub figure: Vec<f64>,
}

impl Decomposition {
    /// Seasonal strength in [0, 1]: `var(seasonal) / (var(seasonal) + var(remainder))`.
    pub fn seasonal_strength(&self) -> f64 {
        let var_seasonal = population_variance(&self.seasonal).unwrap_or(0.0);
        let var_remainder = population_variance(&self.remainder).unwrap_or(0.0);
        let total = var_seasonal + var_remainder;

        if !total.is_finite() || total < 1e-10 {
            return 0.0;
        }

        (var_seasonal / total).clamp(0.0, 1.0)
    }
}

/// Classical decomposition with a fixed seasonal period.
#[derive(Debug, Clone)]
pub struct ClassicalDecomposition {
    period: usize,
}

impl ClassicalDecomposition {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(2),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Minimum series length accepted by [`decompose`](Self::decompose).
    pub fn min_length(&self) -> usize {
        2 * self.period
    }

    /// Decompose the series.
    ///
    /// Fails with `InsufficientData` below two full periods and with
    /// `ComputationError` when the input or any component is non-finite.
    pub fn decompose(&self, series: &[f64]) -> Result<Decomposition> {
        let n = series.len();
        if n < self.min_length() {
            return Err(AnalysisError::InsufficientData {
                needed: self.min_length(),
                got: n,
            });
        }
        if let Some(i) = series.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::ComputationError(format!(
                "non-finite value at position {}",
                i
            )));
        }

        let mut trend = self.centered_moving_average(series);
        self.extrapolate_edges(&mut trend)?;

        let detrended: Vec<f64> = series.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();

        let figure = self.seasonal_figure(&detrended);
        let seasonal: Vec<f64> = (0..n).map(|i| figure[i % self.period]).collect();

        let remainder: Vec<f64> = detrended
            .iter()
            .zip(seasonal.iter())
            .map(|(d, s)| d - s)
            .collect();

        if remainder.iter().any(|r| !r.is_finite()) {
            return Err(AnalysisError::ComputationError(
                "decomposition produced a non-finite remainder".to_string(),
            ));
        }

        Ok(Decomposition {
            trend,
            seasonal,
            remainder,
            figure,
        })
    }

    /// Centered moving average; `NaN` where the window does not fit.
    ///
    /// Even periods use a 2×period average (half weights on both ends).
    fn centered_moving_average(&self, series: &[f64]) -> Vec<f64> {
        let n = series.len();
        let period = self.period;

        let weights: Vec<f64> = if period % 2 == 0 {
            let mut w = vec![1.0 / period as f64; period + 1];
            w[0] = 0.5 / period as f64;
            w[period] = 0.5 / period as f64;
            w
        } else {
            vec![1.0 / period as f64; period]
        };

        let half = weights.len() / 2;
        let mut result = vec![f64::NAN; n];

        for i in half..n.saturating_sub(half) {
            let start = i - half;
            result[i] = weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * series[start + k])
                .sum();
        }

        result
    }

    /// Fill the undefined ends of the trend with least-squares lines fitted
    /// to the nearest `period - 1` defined values on each side.
    fn extrapolate_edges(&self, trend: &mut [f64]) -> Result<()> {
        let first = trend.iter().position(|v| v.is_finite());
        let last = trend.iter().rposition(|v| v.is_finite());
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(AnalysisError::ComputationError(
                    "trend has no defined values".to_string(),
                ))
            }
        };

        let npoints = (self.period - 1).max(2);

        let head_end = (first + npoints).min(last + 1);
        let (x, y) = Self::points(trend, first, head_end);
        let (b0, b1) = linear_fit(&x, &y).unwrap_or((trend[first], 0.0));
        for (i, value) in trend.iter_mut().enumerate().take(first) {
            *value = b0 + b1 * i as f64;
        }

        let tail_start = (last + 1).saturating_sub(npoints).max(first);
        let (x, y) = Self::points(trend, tail_start, last + 1);
        let (b0, b1) = linear_fit(&x, &y).unwrap_or((trend[last], 0.0));
        for (i, value) in trend.iter_mut().enumerate().skip(last + 1) {
            *value = b0 + b1 * i as f64;
        }

        Ok(())
    }

    fn points(values: &[f64], start: usize, end: usize) -> (Vec<f64>, Vec<f64>) {
        (start..end).map(|i| (i as f64, values[i])).unzip()
    }

    /// Mean detrended value at each cycle position, centered on zero.
    fn seasonal_figure(&self, detrended: &[f64]) -> Vec<f64> {
        let period = self.period;
        let mut figure: Vec<f64> = (0..period)
            .map(|pos| {
                let values: Vec<f64> = detrended
                    .iter()
                    .skip(pos)
                    .step_by(period)
                    .copied()
                    .filter(|v| v.is_finite())
                    .collect();
                mean(&values).unwrap_or(0.0)
            })
            .collect();

        let center = mean(&figure).unwrap_or(0.0);
        for v in figure.iter_mut() {
            *v -= center;
        }
        figure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weekly_series(n: usize, amplitude: f64) -> Vec<f64> {
        let profile = [1.0, 1.1, 1.2, 1.1, 0.9, -2.0, -2.3];
        (0..n)
            .map(|i| 100.0 + 0.2 * i as f64 + amplitude * profile[i % 7])
            .collect()
    }

    #[test]
    fn additive_reconstruction() {
        let series = weekly_series(70, 10.0);
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();

        assert_eq!(result.trend.len(), series.len());
        assert_eq!(result.seasonal.len(), series.len());
        assert_eq!(result.remainder.len(), series.len());
        assert_eq!(result.figure.len(), 7);

        for i in 0..series.len() {
            let reconstructed = result.trend[i] + result.seasonal[i] + result.remainder[i];
            assert!(
                (series[i] - reconstructed).abs() < 1e-9,
                "day {i}: {} != {reconstructed}",
                series[i]
            );
        }
    }

    #[test]
    fn figure_is_centered() {
        let series = weekly_series(70, 10.0);
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();
        let sum: f64 = result.figure.iter().sum();
        assert_relative_eq!(sum, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn detects_strong_weekly_pattern() {
        let series = weekly_series(84, 20.0);
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();
        let strength = result.seasonal_strength();
        assert!(strength > 0.9, "Expected strong seasonality, got {}", strength);
    }

    #[test]
    fn linear_trend_has_no_seasonality() {
        let series: Vec<f64> = (0..60).map(|i| 5.0 + 0.5 * i as f64).collect();
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();
        assert!(result.seasonal_strength() < 0.3);
    }

    #[test]
    fn constant_series_has_zero_strength() {
        let series = vec![42.0; 60];
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();
        assert_eq!(result.seasonal_strength(), 0.0);
        for &s in &result.seasonal {
            assert!(s.abs() < 1e-9);
        }
    }

    #[test]
    fn even_period_uses_two_by_ma() {
        let series: Vec<f64> = (0..90)
            .map(|i| 50.0 + 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 30.0).sin())
            .collect();
        let result = ClassicalDecomposition::new(30).decompose(&series).unwrap();
        assert_eq!(result.figure.len(), 30);
        assert!(result.seasonal_strength() > 0.5);
    }

    #[test]
    fn insufficient_data() {
        let series = vec![1.0; 13];
        match ClassicalDecomposition::new(7).decompose(&series) {
            Err(AnalysisError::InsufficientData { needed, got }) => {
                assert_eq!(needed, 14);
                assert_eq!(got, 13);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn non_finite_input_is_a_computation_error() {
        let mut series = weekly_series(28, 5.0);
        series[10] = f64::NAN;
        assert!(matches!(
            ClassicalDecomposition::new(7).decompose(&series),
            Err(AnalysisError::ComputationError(_))
        ));
    }

    #[test]
    fn strength_range() {
        let series = weekly_series(56, 3.0);
        let result = ClassicalDecomposition::new(7).decompose(&series).unwrap();
        let strength = result.seasonal_strength();
        assert!((0.0..=1.0).contains(&strength));
    }
}
