//! Observed CTR versus the CTR expected for a ranking position.

use crate::analysis::aggregate::{group_by, page_query};
use crate::core::Dataset;
use crate::error::{AnalysisError, Result};
use crate::scoring::{significance_score, SignificanceFilter};
use crate::utils::{median, round_to};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Expected CTR for positions 1 through 10.
const FIRST_PAGE_CTR: [f64; 10] = [0.20, 0.10, 0.06, 0.04, 0.03, 0.02, 0.015, 0.01, 0.008, 0.005];
const SECOND_PAGE_CTR: f64 = 0.004;
const THIRD_PAGE_CTR: f64 = 0.002;
const ABOVE_FIRST_CTR: f64 = 0.25;

/// Minimum absolute CTR gap for an outlier.
const MIN_CTR_DIFFERENCE: f64 = 0.02;
/// Minimum relative CTR gap for an outlier, in percent.
const MIN_CTR_DIFFERENCE_PCT: f64 = 15.0;

/// Static expected CTR for a position, rounded to the nearest rank.
pub fn static_expected_ctr(position: f64) -> f64 {
    let rank = position.round();
    if rank < 1.0 {
        ABOVE_FIRST_CTR
    } else if rank <= 10.0 {
        FIRST_PAGE_CTR[rank as usize - 1]
    } else if rank <= 20.0 {
        SECOND_PAGE_CTR
    } else if rank <= 30.0 {
        THIRD_PAGE_CTR
    } else {
        0.20 * 0.70_f64.powf(rank - 1.0)
    }
}

/// Expected CTR by rounded position, calibrated from history where possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CtrCurve {
    calibrated: BTreeMap<u32, f64>,
}

impl CtrCurve {
    /// A curve that always uses the static table.
    pub fn static_only() -> Self {
        Self::default()
    }

    /// Median CTR per rounded position over significant historical rows.
    ///
    /// Positions outside `1..=max_position` or with fewer than `min_samples`
    /// rows keep the static value.
    pub fn calibrate(
        historical: &Dataset,
        filter: &SignificanceFilter,
        min_samples: usize,
        max_position: u32,
    ) -> Self {
        let mut by_rank: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for r in filter.apply(historical) {
            let rank = r.position.round();
            if rank >= 1.0 && rank <= max_position as f64 {
                by_rank.entry(rank as u32).or_default().push(r.ctr);
            }
        }

        let calibrated: BTreeMap<u32, f64> = by_rank
            .into_iter()
            .filter(|(_, ctrs)| ctrs.len() >= min_samples.max(1))
            .filter_map(|(rank, ctrs)| median(&ctrs).map(|m| (rank, m)))
            .collect();

        debug!(positions = calibrated.len(), "calibrated CTR curve");
        Self { calibrated }
    }

    pub fn calibrated_positions(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.calibrated.iter().map(|(&k, &v)| (k, v))
    }

    pub fn is_calibrated(&self) -> bool {
        !self.calibrated.is_empty()
    }

    pub fn expected_ctr(&self, position: f64) -> f64 {
        let rank = position.round();
        if rank >= 1.0 {
            if let Some(&ctr) = self.calibrated.get(&(rank as u32)) {
                return ctr;
            }
        }
        static_expected_ctr(position)
    }
}

/// Performance of a page/query CTR against expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrStatus {
    Underperforming,
    Overperforming,
    Normal,
}

impl CtrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CtrStatus::Underperforming => "underperforming",
            CtrStatus::Overperforming => "overperforming",
            CtrStatus::Normal => "normal",
        }
    }
}

/// Configuration for CTR outlier detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtrOutlierConfig {
    /// Use the calibrated curve when history is available.
    pub use_baseline: bool,
    /// Rows needed at a position before its calibrated median is trusted.
    pub min_calibration_samples: usize,
    /// Highest rounded position that is calibrated.
    pub max_calibrated_position: u32,
    pub filter: SignificanceFilter,
}

impl Default for CtrOutlierConfig {
    fn default() -> Self {
        Self {
            use_baseline: true,
            min_calibration_samples: 1,
            max_calibrated_position: 20,
            filter: SignificanceFilter::default(),
        }
    }
}

impl CtrOutlierConfig {
    pub fn with_use_baseline(mut self, use_baseline: bool) -> Self {
        self.use_baseline = use_baseline;
        self
    }

    pub fn with_min_calibration_samples(mut self, samples: usize) -> Self {
        self.min_calibration_samples = samples;
        self
    }

    pub fn with_filter(mut self, filter: SignificanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_calibrated_position == 0 {
            return Err(AnalysisError::InvalidParameter(
                "max_calibrated_position must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// CTR comparison for one page × query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrOutlierRow {
    pub page: String,
    pub query: String,
    pub avg_position: f64,
    pub actual_ctr: f64,
    pub expected_ctr: f64,
    pub ctr_difference: f64,
    pub ctr_difference_pct: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub is_underperforming: bool,
    pub is_overperforming: bool,
    pub significance_score: f64,
    pub status: CtrStatus,
}

/// Flags page/query pairs whose CTR departs from the position baseline.
#[derive(Debug, Clone)]
pub struct CtrOutlierAnalyzer {
    curve: CtrCurve,
    config: CtrOutlierConfig,
}

impl CtrOutlierAnalyzer {
    /// Analyzer with a curve calibrated from `historical` per the default config.
    pub fn new(historical: &Dataset) -> Self {
        Self::with_config(historical, CtrOutlierConfig::default())
    }

    pub fn with_config(historical: &Dataset, config: CtrOutlierConfig) -> Self {
        let curve = if config.use_baseline && !historical.is_empty() {
            CtrCurve::calibrate(
                historical,
                &config.filter,
                config.min_calibration_samples,
                config.max_calibrated_position,
            )
        } else {
            CtrCurve::static_only()
        };
        Self { curve, config }
    }

    /// Analyzer using the static curve only.
    pub fn without_history(config: CtrOutlierConfig) -> Self {
        Self {
            curve: CtrCurve::static_only(),
            config,
        }
    }

    pub fn curve(&self) -> &CtrCurve {
        &self.curve
    }

    pub fn analyze(&self, data: &Dataset) -> Result<Vec<CtrOutlierRow>> {
        self.config.validate()?;

        let filter = &self.config.filter;
        let rows = filter.apply(data);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for ((page, query), totals) in group_by(&rows, page_query) {
            if !filter.group_qualifies(totals.impressions, totals.clicks) {
                continue;
            }
            let (Some(avg_position), Some(actual_ctr)) = (totals.mean_position(), totals.mean_ctr())
            else {
                continue;
            };

            let expected_ctr = self.curve.expected_ctr(avg_position);
            let ctr_difference = actual_ctr - expected_ctr;
            let ctr_difference_pct = if expected_ctr > 0.0 {
                ctr_difference / expected_ctr * 100.0
            } else {
                0.0
            };

            let is_underperforming =
                ctr_difference < -MIN_CTR_DIFFERENCE && ctr_difference_pct < -MIN_CTR_DIFFERENCE_PCT;
            let is_overperforming =
                ctr_difference > MIN_CTR_DIFFERENCE && ctr_difference_pct > MIN_CTR_DIFFERENCE_PCT;
            let status = if is_underperforming {
                CtrStatus::Underperforming
            } else if is_overperforming {
                CtrStatus::Overperforming
            } else {
                CtrStatus::Normal
            };

            out.push(CtrOutlierRow {
                page: page.to_string(),
                query: query.to_string(),
                avg_position: round_to(avg_position, 2),
                actual_ctr: round_to(actual_ctr, 4),
                expected_ctr: round_to(expected_ctr, 4),
                ctr_difference: round_to(ctr_difference, 4),
                ctr_difference_pct: round_to(ctr_difference_pct, 2),
                impressions: totals.impressions,
                clicks: totals.clicks,
                is_underperforming,
                is_overperforming,
                significance_score: round_to(
                    significance_score(totals.impressions as f64, totals.clicks as f64),
                    2,
                ),
                status,
            });
        }

        out.sort_by(|a, b| {
            b.is_underperforming
                .cmp(&a.is_underperforming)
                .then_with(|| b.significance_score.total_cmp(&a.significance_score))
                .then_with(|| a.page.cmp(&b.page))
                .then_with(|| a.query.cmp(&b.query))
        });

        debug!(
            rows = out.len(),
            underperforming = out.iter().filter(|r| r.is_underperforming).count(),
            "CTR outliers computed"
        );
        Ok(out)
    }
}
