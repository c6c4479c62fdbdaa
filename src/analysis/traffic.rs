//! Page × query traffic changes between two adjacent windows.

use crate::analysis::aggregate::{group_by, outer_join, page_query, Totals};
use crate::analysis::rules::{Rule, RuleSet};
use crate::core::{comparison_windows, weekend_share, ComparisonPeriod, Dataset};
use crate::error::{AnalysisError, Result};
use crate::scoring::{significance_score, SignificanceFilter};
use crate::seasonality::SeasonalityOracle;
use crate::utils::{percentage_change, position_delta, round_to};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Cause attributed to a traffic change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    RankingImprovement,
    RankingDecline,
    SeasonalIncrease,
    SeasonalDecrease,
    WeekendIncrease,
    WeekendDecrease,
    CtrImprovement,
    CtrDecline,
    TrafficIncrease,
    TrafficDecrease,
    Other,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::RankingImprovement => "ranking_improvement",
            ChangeType::RankingDecline => "ranking_decline",
            ChangeType::SeasonalIncrease => "seasonal_increase",
            ChangeType::SeasonalDecrease => "seasonal_decrease",
            ChangeType::WeekendIncrease => "weekend_increase",
            ChangeType::WeekendDecrease => "weekend_decrease",
            ChangeType::CtrImprovement => "ctr_improvement",
            ChangeType::CtrDecline => "ctr_decline",
            ChangeType::TrafficIncrease => "traffic_increase",
            ChangeType::TrafficDecrease => "traffic_decrease",
            ChangeType::Other => "other",
        }
    }

    /// Changes explained by calendar effects rather than site performance.
    pub fn is_calendar_effect(&self) -> bool {
        matches!(
            self,
            ChangeType::SeasonalIncrease
                | ChangeType::SeasonalDecrease
                | ChangeType::WeekendIncrease
                | ChangeType::WeekendDecrease
        )
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the change classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeSignals {
    pub impressions_change: f64,
    pub clicks_change: f64,
    /// Position delta, 0 when either window lacks a position.
    pub position_change: f64,
    pub is_seasonal: bool,
    /// The current window holds more weekend days than the previous one.
    pub weekend_effect: bool,
}

/// The ordered decision list used to label traffic changes.
pub fn change_rules() -> RuleSet<ChangeSignals, ChangeType> {
    RuleSet::new(
        vec![
            Rule::new(ChangeType::RankingImprovement, |s| {
                s.position_change < -0.5 && s.impressions_change > 0.0
            }),
            Rule::new(ChangeType::RankingDecline, |s| {
                s.position_change > 0.5 && s.impressions_change < 0.0
            }),
            Rule::new(ChangeType::SeasonalIncrease, |s| {
                s.is_seasonal && s.impressions_change > 0.0
            }),
            Rule::new(ChangeType::SeasonalDecrease, |s| s.is_seasonal),
            Rule::new(ChangeType::WeekendIncrease, |s| {
                s.weekend_effect && s.impressions_change > 0.0
            }),
            Rule::new(ChangeType::WeekendDecrease, |s| {
                s.weekend_effect && s.impressions_change < 0.0
            }),
            Rule::new(ChangeType::CtrImprovement, |s| {
                s.impressions_change > 0.0 && s.clicks_change > s.impressions_change * 0.01
            }),
            Rule::new(ChangeType::CtrDecline, |s| {
                s.impressions_change > 0.0 && s.clicks_change < s.impressions_change * 0.005
            }),
            Rule::new(ChangeType::TrafficIncrease, |s| s.impressions_change > 0.0),
            Rule::new(ChangeType::TrafficDecrease, |s| s.impressions_change < 0.0),
        ],
        ChangeType::Other,
    )
}

/// Configuration for traffic change analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficChangeConfig {
    pub comparison_period: ComparisonPeriod,
    /// Minimum absolute impressions or clicks change, in percent.
    pub min_change_pct: f64,
    pub filter: SignificanceFilter,
}

impl Default for TrafficChangeConfig {
    fn default() -> Self {
        Self {
            comparison_period: ComparisonPeriod::Week,
            min_change_pct: 15.0,
            filter: SignificanceFilter::default(),
        }
    }
}

impl TrafficChangeConfig {
    pub fn with_comparison_period(mut self, period: ComparisonPeriod) -> Self {
        self.comparison_period = period;
        self
    }

    pub fn with_min_change_pct(mut self, pct: f64) -> Self {
        self.min_change_pct = pct;
        self
    }

    pub fn with_filter(mut self, filter: SignificanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_change_pct.is_finite() || self.min_change_pct < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_change_pct must be a non-negative number, got {}",
                self.min_change_pct
            )));
        }
        Ok(())
    }
}

/// One significant page × query change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficChangeRow {
    pub page: String,
    pub query: String,
    /// First country seen for the key in the current window.
    pub country: Option<String>,
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
    /// Negative means the page moved up the results.
    pub position_change: Option<f64>,
    pub significance_score: f64,
    pub seasonality_adjusted: bool,
    pub change_type: ChangeType,
}

/// Detects significant traffic changes per page × query.
pub struct TrafficChangeAnalyzer<'a> {
    historical: &'a Dataset,
    oracle: &'a dyn SeasonalityOracle,
    config: TrafficChangeConfig,
}

impl<'a> TrafficChangeAnalyzer<'a> {
    pub fn new(historical: &'a Dataset, oracle: &'a dyn SeasonalityOracle) -> Self {
        Self {
            historical,
            oracle,
            config: TrafficChangeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TrafficChangeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TrafficChangeConfig {
        &self.config
    }

    /// Compare the latest window of `recent` with the preceding window of history.
    ///
    /// Returns an empty table when either window has no significant rows.
    pub fn analyze(&self, recent: &Dataset) -> Result<Vec<TrafficChangeRow>> {
        self.config.validate()?;

        let latest = match recent.max_date() {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        if self.historical.is_empty() {
            return Ok(Vec::new());
        }

        let (current_window, previous_window) =
            comparison_windows(latest, self.config.comparison_period.days());
        let filter = &self.config.filter;
        let current = filter.apply(recent.within(&current_window));
        let previous = filter.apply(self.historical.within(&previous_window));

        debug!(
            current_rows = current.len(),
            previous_rows = previous.len(),
            start = %current_window.start,
            end = %current_window.end,
            "traffic change windows"
        );

        if current.is_empty() || previous.is_empty() {
            return Ok(Vec::new());
        }

        let weekend_effect = weekend_share(&current) > weekend_share(&previous);
        let rules = change_rules();

        let joined = outer_join(group_by(&current, page_query), group_by(&previous, page_query));

        let mut rows: Vec<TrafficChangeRow> = joined
            .into_iter()
            .filter_map(|((page, query), cur, prev)| {
                self.build_row(page, query, cur.as_ref(), prev.as_ref(), weekend_effect, &rules)
            })
            .collect();

        rows.sort_by(|a, b| {
            b.significance_score
                .total_cmp(&a.significance_score)
                .then_with(|| b.impressions_change_pct.total_cmp(&a.impressions_change_pct))
                .then_with(|| a.page.cmp(&b.page))
                .then_with(|| a.query.cmp(&b.query))
        });

        debug!(rows = rows.len(), "traffic changes detected");
        Ok(rows)
    }

    fn build_row(
        &self,
        page: &str,
        query: &str,
        cur: Option<&Totals<'_>>,
        prev: Option<&Totals<'_>>,
        weekend_effect: bool,
        rules: &RuleSet<ChangeSignals, ChangeType>,
    ) -> Option<TrafficChangeRow> {
        let imp_cur = cur.map_or(0, |t| t.impressions);
        let imp_prev = prev.map_or(0, |t| t.impressions);
        let clk_cur = cur.map_or(0, |t| t.clicks);
        let clk_prev = prev.map_or(0, |t| t.clicks);

        let impressions_change = imp_cur as i64 - imp_prev as i64;
        let clicks_change = clk_cur as i64 - clk_prev as i64;
        let impressions_change_pct = percentage_change(imp_prev as f64, imp_cur as f64);
        let clicks_change_pct = percentage_change(clk_prev as f64, clk_cur as f64);
        // Threshold on the unrounded change
        let min = self.config.min_change_pct;
        if impressions_change_pct.abs() < min && clicks_change_pct.abs() < min {
            return None;
        }

        let position_current = cur.and_then(|t| t.mean_position());
        let position_previous = prev.and_then(|t| t.mean_position());
        let position_change = position_delta(position_previous, position_current);

        let seasonality_adjusted = self.oracle.is_seasonal(page, query, impressions_change_pct);

        let change_type = rules.classify(&ChangeSignals {
            impressions_change: impressions_change as f64,
            clicks_change: clicks_change as f64,
            position_change: position_change.unwrap_or(0.0),
            is_seasonal: seasonality_adjusted,
            weekend_effect,
        });

        Some(TrafficChangeRow {
            page: page.to_string(),
            query: query.to_string(),
            country: cur.and_then(|t| t.country()).map(str::to_string),
            impressions_current: imp_cur,
            impressions_previous: imp_prev,
            impressions_change,
            impressions_change_pct: round_to(impressions_change_pct, 1),
            clicks_current: clk_cur,
            clicks_previous: clk_prev,
            clicks_change,
            clicks_change_pct: round_to(clicks_change_pct, 1),
            position_current: position_current.map(|p| round_to(p, 2)),
            position_previous: position_previous.map(|p| round_to(p, 2)),
            position_change: position_change.map(|p| round_to(p, 2)),
            significance_score: round_to(significance_score(imp_cur as f64, clk_cur as f64), 2),
            seasonality_adjusted,
            change_type,
        })
    }
}
