//! Business significance scoring and the volume filter applied before grouping.

use crate::core::PerformanceRecord;
use serde::{Deserialize, Serialize};

/// Bounds on the baseline adjustment ratio.
const MIN_BASELINE_RATIO: f64 = 0.5;
const MAX_BASELINE_RATIO: f64 = 2.0;

/// Reference volume used to scale a significance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceBaseline {
    /// Typical impressions for a comparable key.
    pub avg_impressions: f64,
}

/// Convert raw volume into a 0–100 significance score.
///
/// Impressions and clicks are log-compressed so very large keys do not
/// dominate; clicks carry more weight than impressions.
pub fn significance_score(impressions: f64, clicks: f64) -> f64 {
    significance_score_with_baseline(impressions, clicks, None)
}

/// Significance score, scaled by actual-to-baseline impressions when a baseline is known.
pub fn significance_score_with_baseline(
    impressions: f64,
    clicks: f64,
    baseline: Option<&SignificanceBaseline>,
) -> f64 {
    if impressions.is_nan() || impressions <= 0.0 {
        return 0.0;
    }

    let imp_score = (20.0 * impressions.log10()).clamp(0.0, 100.0);
    let click_score = (25.0 * (clicks.max(0.0) + 1.0).log10()).clamp(0.0, 100.0);
    let mut combined = 0.4 * imp_score + 0.6 * click_score;

    if let Some(base) = baseline {
        if base.avg_impressions > 0.0 {
            let ratio =
                (impressions / base.avg_impressions).clamp(MIN_BASELINE_RATIO, MAX_BASELINE_RATIO);
            combined *= ratio;
        }
    }

    combined.min(100.0)
}

/// Drops low-volume rows before any per-group aggregation.
///
/// The row filter looks at impressions only. `min_clicks` is a group gate
/// used where a click rate is judged (CTR outliers); comparative analyzers
/// do not gate on clicks, since a new or lost key has none in one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceFilter {
    /// Rows with fewer impressions are discarded.
    pub min_impressions: u64,
    /// Minimum clicks for a group to be scored by volume-sensitive analyzers.
    pub min_clicks: u64,
}

impl Default for SignificanceFilter {
    fn default() -> Self {
        Self {
            min_impressions: 10,
            min_clicks: 3,
        }
    }
}

impl SignificanceFilter {
    pub fn new(min_impressions: u64, min_clicks: u64) -> Self {
        Self {
            min_impressions,
            min_clicks,
        }
    }

    pub fn with_min_impressions(mut self, min_impressions: u64) -> Self {
        self.min_impressions = min_impressions;
        self
    }

    pub fn with_min_clicks(mut self, min_clicks: u64) -> Self {
        self.min_clicks = min_clicks;
        self
    }

    /// Whether a single row survives the filter; clicks are not consulted.
    pub fn keeps(&self, record: &PerformanceRecord) -> bool {
        record.impressions >= self.min_impressions
    }

    /// Whether an aggregated group meets both volume minimums.
    pub fn group_qualifies(&self, impressions: u64, clicks: u64) -> bool {
        impressions >= self.min_impressions && clicks >= self.min_clicks
    }

    /// Keep only the rows that survive the filter.
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a PerformanceRecord>
    where
        I: IntoIterator<Item = &'a PerformanceRecord>,
    {
        records.into_iter().filter(|r| self.keeps(r)).collect()
    }
}
