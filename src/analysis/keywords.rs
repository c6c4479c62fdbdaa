//! Rising and declining queries between two adjacent windows.

use crate::analysis::aggregate::{group_by, outer_join, query_only, Totals};
use crate::core::{comparison_windows, Dataset};
use crate::error::{AnalysisError, Result};
use crate::scoring::{significance_score, SignificanceFilter};
use crate::seasonality::SeasonalityOracle;
use crate::utils::{percentage_change, position_delta, round_to};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position assumed for opportunity scoring when a query has no current rank.
const UNRANKED_POSITION: f64 = 100.0;

/// Configuration for keyword trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTrendConfig {
    /// Length of each comparison window in days.
    pub trend_period_days: u32,
    /// Minimum absolute impressions change, in percent.
    pub min_change_pct: f64,
    /// Minimum significance score for either set.
    pub min_significance: f64,
    /// Drop changes the seasonality oracle attributes to seasonality.
    pub exclude_seasonal: bool,
    pub filter: SignificanceFilter,
}

impl Default for KeywordTrendConfig {
    fn default() -> Self {
        Self {
            trend_period_days: 30,
            min_change_pct: 20.0,
            min_significance: 5.0,
            exclude_seasonal: false,
            filter: SignificanceFilter::default(),
        }
    }
}

impl KeywordTrendConfig {
    pub fn with_trend_period_days(mut self, days: u32) -> Self {
        self.trend_period_days = days;
        self
    }

    pub fn with_min_change_pct(mut self, pct: f64) -> Self {
        self.min_change_pct = pct;
        self
    }

    pub fn with_min_significance(mut self, significance: f64) -> Self {
        self.min_significance = significance;
        self
    }

    pub fn with_exclude_seasonal(mut self, exclude: bool) -> Self {
        self.exclude_seasonal = exclude;
        self
    }

    pub fn with_filter(mut self, filter: SignificanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trend_period_days == 0 {
            return Err(AnalysisError::InvalidParameter(
                "trend_period_days must be at least 1".to_string(),
            ));
        }
        if !self.min_change_pct.is_finite() || self.min_change_pct < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_change_pct must be a non-negative number, got {}",
                self.min_change_pct
            )));
        }
        if !self.min_significance.is_finite() {
            return Err(AnalysisError::InvalidParameter(
                "min_significance must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// One query compared across the two windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTrendRow {
    pub query: String,
    /// Page most often serving the query, current window first.
    pub page: String,
    pub impressions_current: u64,
    pub impressions_previous: u64,
    pub impressions_change: i64,
    pub impressions_change_pct: f64,
    pub clicks_current: u64,
    pub clicks_previous: u64,
    pub clicks_change: i64,
    pub clicks_change_pct: f64,
    pub position_current: Option<f64>,
    pub position_previous: Option<f64>,
    pub position_change: Option<f64>,
    /// Significance of current-window volume.
    pub significance_score: f64,
    pub is_seasonal: bool,
    pub is_new: bool,
    pub is_lost: bool,
    /// Set on rising rows.
    pub opportunity_score: Option<f64>,
    /// Set on declining rows.
    pub risk_score: Option<f64>,
}

/// The two keyword sets, each sorted by its own score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordTrends {
    pub rising: Vec<KeywordTrendRow>,
    pub declining: Vec<KeywordTrendRow>,
}

/// Score how much head-room a rising query has.
///
/// Queries further down the results page get a larger position factor;
/// queries with no prior impressions get a bonus.
pub fn opportunity_score(
    impressions: u64,
    clicks: u64,
    change_pct: f64,
    position: f64,
    is_new: bool,
) -> f64 {
    let base = significance_score(impressions as f64, clicks as f64);
    let growth_factor = (1.0 + change_pct / 100.0).min(2.0);
    let position_factor = if position <= 10.0 {
        0.7 + 0.3 * position / 10.0
    } else if position <= 20.0 {
        1.0 + (position - 10.0) / 10.0 * 0.5
    } else {
        1.5
    };
    let new_bonus = if is_new { 1.3 } else { 1.0 };
    (base * growth_factor * position_factor * new_bonus).clamp(0.0, 100.0)
}

/// Score the exposure of a declining query, from its previous volume.
pub fn risk_score(impressions: u64, clicks: u64, change_pct: f64, is_lost: bool) -> f64 {
    let base = significance_score(impressions as f64, clicks as f64);
    let decline_factor = (1.0 + change_pct.abs() / 100.0).min(2.0);
    let lost_penalty = if is_lost { 1.5 } else { 1.0 };
    (base * decline_factor * lost_penalty).clamp(0.0, 100.0)
}

/// Unrounded figures the set gates and scores are computed from.
struct RawChange {
    impressions_change_pct: f64,
    position_current: Option<f64>,
    significance_current: f64,
    significance_previous: f64,
}

/// Finds rising and declining queries.
pub struct KeywordTrendAnalyzer<'a> {
    historical: &'a Dataset,
    oracle: &'a dyn SeasonalityOracle,
    config: KeywordTrendConfig,
}

impl<'a> KeywordTrendAnalyzer<'a> {
    pub fn new(historical: &'a Dataset, oracle: &'a dyn SeasonalityOracle) -> Self {
        Self {
            historical,
            oracle,
            config: KeywordTrendConfig::default(),
        }
    }

    pub fn with_config(mut self, config: KeywordTrendConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &KeywordTrendConfig {
        &self.config
    }

    pub fn analyze(&self, recent: &Dataset) -> Result<KeywordTrends> {
        self.config.validate()?;

        let latest = match recent.max_date() {
            Some(d) => d,
            None => return Ok(KeywordTrends::default()),
        };
        if self.historical.is_empty() {
            return Ok(KeywordTrends::default());
        }

        let (current_window, previous_window) =
            comparison_windows(latest, self.config.trend_period_days);
        let filter = &self.config.filter;
        let current = filter.apply(recent.within(&current_window));
        let previous = filter.apply(self.historical.within(&previous_window));

        debug!(
            current_rows = current.len(),
            previous_rows = previous.len(),
            days = self.config.trend_period_days,
            "keyword trend windows"
        );

        let joined = outer_join(group_by(&current, query_only), group_by(&previous, query_only));
        let min_change = self.config.min_change_pct;
        let min_impressions = filter.min_impressions;
        let min_significance = self.config.min_significance;

        let mut trends = KeywordTrends::default();
        for (query, cur, prev) in joined {
            let (mut row, raw) = self.build_row(query, cur.as_ref(), prev.as_ref());
            if self.config.exclude_seasonal && row.is_seasonal {
                continue;
            }

            let pct = raw.impressions_change_pct;
            if pct >= min_change
                && row.impressions_current >= min_impressions
                && raw.significance_current >= min_significance
            {
                let position = raw.position_current.unwrap_or(UNRANKED_POSITION);
                let score = opportunity_score(
                    row.impressions_current,
                    row.clicks_current,
                    pct,
                    position,
                    row.is_new,
                );
                row.opportunity_score = Some(round_to(score, 1));
                trends.rising.push(row);
            } else if pct <= -min_change
                && row.impressions_previous >= min_impressions
                && raw.significance_previous >= min_significance
            {
                let score = risk_score(
                    row.impressions_previous,
                    row.clicks_previous,
                    pct,
                    row.is_lost,
                );
                row.risk_score = Some(round_to(score, 1));
                trends.declining.push(row);
            }
        }

        trends.rising.sort_by(|a, b| {
            b.opportunity_score
                .unwrap_or(0.0)
                .total_cmp(&a.opportunity_score.unwrap_or(0.0))
                .then_with(|| a.query.cmp(&b.query))
        });
        trends.declining.sort_by(|a, b| {
            b.risk_score
                .unwrap_or(0.0)
                .total_cmp(&a.risk_score.unwrap_or(0.0))
                .then_with(|| a.query.cmp(&b.query))
        });

        debug!(
            rising = trends.rising.len(),
            declining = trends.declining.len(),
            "keyword trends computed"
        );
        Ok(trends)
    }

    fn build_row(
        &self,
        query: &str,
        cur: Option<&Totals<'_>>,
        prev: Option<&Totals<'_>>,
    ) -> (KeywordTrendRow, RawChange) {
        let imp_cur = cur.map_or(0, |t| t.impressions);
        let imp_prev = prev.map_or(0, |t| t.impressions);
        let clk_cur = cur.map_or(0, |t| t.clicks);
        let clk_prev = prev.map_or(0, |t| t.clicks);

        let page = cur
            .and_then(|t| t.modal_page())
            .or_else(|| prev.and_then(|t| t.modal_page()))
            .unwrap_or_default()
            .to_string();

        let impressions_change_pct = percentage_change(imp_prev as f64, imp_cur as f64);
        let position_current = cur.and_then(|t| t.mean_position());
        let position_previous = prev.and_then(|t| t.mean_position());
        let is_seasonal = self.oracle.is_seasonal(&page, query, impressions_change_pct);
        let significance_current = significance_score(imp_cur as f64, clk_cur as f64);

        let row = KeywordTrendRow {
            query: query.to_string(),
            page,
            impressions_current: imp_cur,
            impressions_previous: imp_prev,
            impressions_change: imp_cur as i64 - imp_prev as i64,
            impressions_change_pct: round_to(impressions_change_pct, 1),
            clicks_current: clk_cur,
            clicks_previous: clk_prev,
            clicks_change: clk_cur as i64 - clk_prev as i64,
            clicks_change_pct: round_to(percentage_change(clk_prev as f64, clk_cur as f64), 1),
            position_current: position_current.map(|p| round_to(p, 2)),
            position_previous: position_previous.map(|p| round_to(p, 2)),
            position_change: position_delta(position_previous, position_current)
                .map(|p| round_to(p, 2)),
            significance_score: round_to(significance_current, 2),
            is_seasonal,
            is_new: imp_prev == 0,
            is_lost: imp_cur == 0,
            opportunity_score: None,
            risk_score: None,
        };
        let raw = RawChange {
            impressions_change_pct,
            position_current,
            significance_current,
            significance_previous: significance_score(imp_prev as f64, clk_prev as f64),
        };
        (row, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PerformanceRecord;
    use crate::seasonality::NoSeasonality;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    struct SeasonalQuery(&'static str);

    impl SeasonalityOracle for SeasonalQuery {
        fn is_seasonal(&self, _page: &str, query: &str, _change_pct: f64) -> bool {
            query == self.0
        }
    }

    fn latest() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn rec(page: &str, query: &str, days_back: i64, imp: u64, clicks: u64, pos: f64) -> PerformanceRecord {
        PerformanceRecord::new(page, query, latest() - Duration::days(days_back), imp, clicks, pos)
    }

    #[test]
    fn opportunity_score_factors() {
        let base = significance_score(200.0, 20.0);
        let score = opportunity_score(200, 20, 100.0, 5.0, true);
        assert_relative_eq!(score, base * 2.0 * 0.85 * 1.3, epsilon = 1e-9);

        // Page two band
        let score = opportunity_score(200, 20, 50.0, 15.0, false);
        assert_relative_eq!(score, base * 1.5 * 1.25, epsilon = 1e-9);

        // Beyond page two
        let score = opportunity_score(200, 20, 50.0, 40.0, false);
        assert_relative_eq!(score, base * 1.5 * 1.5, epsilon = 1e-9);

        assert!(opportunity_score(1_000_000, 100_000, 500.0, 50.0, true) <= 100.0);
    }

    #[test]
    fn risk_score_factors() {
        let base = significance_score(500.0, 40.0);
        assert_relative_eq!(risk_score(500, 40, -50.0, false), base * 1.5, epsilon = 1e-9);
        assert_relative_eq!(
            risk_score(500, 40, -100.0, true),
            (base * 2.0 * 1.5).min(100.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn new_keyword_is_rising_with_bonus() {
        let historical = Dataset::new(vec![rec("/old", "other", 40, 500, 20, 3.0)]);
        let recent = Dataset::new(vec![
            rec("/p", "new shoes", 0, 100, 10, 5.0),
            rec("/p", "new shoes", 1, 100, 10, 5.0),
        ]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .analyze(&recent)
            .unwrap();

        assert_eq!(trends.rising.len(), 1);
        let row = &trends.rising[0];
        assert!(row.is_new);
        assert!(!row.is_lost);
        assert_eq!(row.impressions_current, 200);
        assert_eq!(row.impressions_change_pct, 100.0);
        assert_eq!(row.position_change, None);
        assert_eq!(row.significance_score, round_to(significance_score(200.0, 20.0), 2));
        let expected = significance_score(200.0, 20.0) * 2.0 * 0.85 * 1.3;
        assert_relative_eq!(row.opportunity_score.unwrap(), expected, epsilon = 0.05);
        assert_eq!(row.risk_score, None);
    }

    #[test]
    fn lost_keyword_is_declining_with_penalty() {
        let historical = Dataset::new(vec![rec("/p", "gone", 40, 800, 40, 4.0)]);
        let recent = Dataset::new(vec![rec("/p", "kept", 0, 50, 5, 2.0)]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .analyze(&recent)
            .unwrap();

        assert_eq!(trends.declining.len(), 1);
        let row = &trends.declining[0];
        assert_eq!(row.query, "gone");
        assert!(row.is_lost);
        assert_eq!(row.page, "/p");
        assert_eq!(row.significance_score, 0.0);
        let expected = (significance_score(800.0, 40.0) * 2.0 * 1.5).min(100.0);
        assert_relative_eq!(row.risk_score.unwrap(), expected, epsilon = 0.05);
    }

    #[test]
    fn modal_page_and_position_change() {
        let historical = Dataset::new(vec![rec("/a", "boots", 35, 1000, 50, 6.0)]);
        let recent = Dataset::new(vec![
            rec("/a", "boots", 0, 800, 60, 4.0),
            rec("/b", "boots", 1, 400, 20, 4.0),
            rec("/b", "boots", 2, 400, 20, 4.0),
        ]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .analyze(&recent)
            .unwrap();
        assert_eq!(trends.rising.len(), 1);
        let row = &trends.rising[0];
        assert_eq!(row.page, "/b");
        assert_eq!(row.impressions_change_pct, 60.0);
        assert_eq!(row.position_change, Some(-2.0));
    }

    #[test]
    fn rising_threshold_uses_unrounded_change() {
        let historical = Dataset::new(vec![rec("/p", "boots", 40, 10_000, 400, 3.0)]);

        // 19.96% would display as 20.0 but stays below the threshold
        let recent = Dataset::new(vec![rec("/p", "boots", 0, 11_996, 480, 3.0)]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .analyze(&recent)
            .unwrap();
        assert!(trends.rising.is_empty());

        let recent = Dataset::new(vec![rec("/p", "boots", 0, 12_004, 480, 3.0)]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .analyze(&recent)
            .unwrap();
        assert_eq!(trends.rising.len(), 1);
        assert_eq!(trends.rising[0].impressions_change_pct, 20.0);
    }

    #[test]
    fn declining_gate_uses_previous_significance() {
        // Current volume scores well under the minimum; previous volume clears it
        let historical = Dataset::new(vec![rec("/p", "sandals", 40, 2000, 100, 3.0)]);
        let recent = Dataset::new(vec![rec("/p", "sandals", 0, 10, 0, 9.0)]);
        let config = KeywordTrendConfig::default().with_min_significance(40.0);

        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .with_config(config.clone())
            .analyze(&recent)
            .unwrap();
        assert_eq!(trends.declining.len(), 1);
        assert!(trends.declining[0].significance_score < 40.0);

        // A low-volume previous window keeps the query out of the set
        let historical = Dataset::new(vec![rec("/p", "sandals", 40, 60, 1, 3.0)]);
        let trends = KeywordTrendAnalyzer::new(&historical, &NoSeasonality)
            .with_config(config)
            .analyze(&recent)
            .unwrap();
        assert!(trends.declining.is_empty());
    }

    #[test]
    fn seasonal_rows_kept_unless_excluded() {
        let historical = Dataset::new(vec![rec("/p", "snow", 40, 100, 10, 3.0)]);
        let recent = Dataset::new(vec![rec("/p", "snow", 0, 300, 30, 3.0)]);
        let oracle = SeasonalQuery("snow");

        let trends = KeywordTrendAnalyzer::new(&historical, &oracle)
            .analyze(&recent)
            .unwrap();
        assert_eq!(trends.rising.len(), 1);
        assert!(trends.rising[0].is_seasonal);

        let trends = KeywordTrendAnalyzer::new(&historical, &oracle)
            .with_config(KeywordTrendConfig::default().with_exclude_seasonal(true))
            .analyze(&recent)
            .unwrap();
        assert!(trends.rising.is_empty());
    }

    #[test]
    fn missing_history_yields_empty_sets() {
        let empty = Dataset::empty();
        let recent = Dataset::new(vec![rec("/p", "q", 0, 300, 30, 3.0)]);
        let trends = KeywordTrendAnalyzer::new(&empty, &NoSeasonality)
            .analyze(&recent)
            .unwrap();
        assert!(trends.rising.is_empty());
        assert!(trends.declining.is_empty());
    }

    #[test]
    fn zero_period_is_rejected() {
        let empty = Dataset::empty();
        let result = KeywordTrendAnalyzer::new(&empty, &NoSeasonality)
            .with_config(KeywordTrendConfig::default().with_trend_period_days(0))
            .analyze(&empty);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
    }
}
