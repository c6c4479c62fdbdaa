//! Page-level performance changes between two adjacent windows.

use crate::analysis::aggregate::{group_by, outer_join, page_only, Totals};
use crate::analysis::rules::{Rule, RuleSet};
use crate::core::{comparison_windows, ComparisonPeriod, Dataset};
use crate::error::{AnalysisError, Result};
use crate::scoring::{significance_score, SignificanceFilter};
use crate::utils::{percentage_change, position_delta, round_to};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Classification of a page's change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlChange {
    NewPage,
    LostPage,
    SignificantImprovement,
    SignificantDecline,
    LosingQueryDiversity,
    GainingQueryDiversity,
    MajorTrafficGain,
    MajorTrafficLoss,
    ModerateTrafficGain,
    ModerateTrafficLoss,
    Stable,
}

impl UrlChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlChange::NewPage => "new_page",
            UrlChange::LostPage => "lost_page",
            UrlChange::SignificantImprovement => "significant_improvement",
            UrlChange::SignificantDecline => "significant_decline",
            UrlChange::LosingQueryDiversity => "losing_query_diversity",
            UrlChange::GainingQueryDiversity => "gaining_query_diversity",
            UrlChange::MajorTrafficGain => "major_traffic_gain",
            UrlChange::MajorTrafficLoss => "major_traffic_loss",
            UrlChange::ModerateTrafficGain => "moderate_traffic_gain",
            UrlChange::ModerateTrafficLoss => "moderate_traffic_loss",
            UrlChange::Stable => "stable",
        }
    }

    pub fn is_improvement(&self) -> bool {
        matches!(
            self,
            UrlChange::SignificantImprovement
                | UrlChange::GainingQueryDiversity
                | UrlChange::MajorTrafficGain
                | UrlChange::ModerateTrafficGain
        )
    }

    pub fn is_decline(&self) -> bool {
        matches!(
            self,
            UrlChange::SignificantDecline
                | UrlChange::LosingQueryDiversity
                | UrlChange::MajorTrafficLoss
                | UrlChange::ModerateTrafficLoss
        )
    }
}

impl fmt::Display for UrlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the page classifier; percentages in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrlSignals {
    pub impressions_change_pct: f64,
    pub queries_change_pct: f64,
    /// Position delta, 0 when either window lacks a position.
    pub position_change: f64,
    pub is_new: bool,
    pub is_lost: bool,
}

/// The ordered decision list used to label page changes.
pub fn url_rules() -> RuleSet<UrlSignals, UrlChange> {
    RuleSet::new(
        vec![
            Rule::new(UrlChange::NewPage, |s| s.is_new),
            Rule::new(UrlChange::LostPage, |s| s.is_lost),
            Rule::new(UrlChange::SignificantImprovement, |s| {
                s.position_change < -0.5 && s.impressions_change_pct > 10.0
            }),
            Rule::new(UrlChange::SignificantDecline, |s| {
                s.position_change > 0.5 && s.impressions_change_pct < -10.0
            }),
            Rule::new(UrlChange::LosingQueryDiversity, |s| {
                s.queries_change_pct < -20.0 && s.impressions_change_pct < -10.0
            }),
            Rule::new(UrlChange::GainingQueryDiversity, |s| {
                s.queries_change_pct > 20.0 && s.impressions_change_pct > 10.0
            }),
            Rule::new(UrlChange::MajorTrafficGain, |s| s.impressions_change_pct > 30.0),
            Rule::new(UrlChange::MajorTrafficLoss, |s| s.impressions_change_pct < -30.0),
            Rule::new(UrlChange::ModerateTrafficGain, |s| s.impressions_change_pct > 10.0),
            Rule::new(UrlChange::ModerateTrafficLoss, |s| s.impressions_change_pct < -10.0),
        ],
        UrlChange::Stable,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPerformanceConfig {
    pub comparison_period: ComparisonPeriod,
    /// Pages below this volume in both windows are dropped.
    pub min_impressions: u64,
    pub filter: SignificanceFilter,
}

impl Default for UrlPerformanceConfig {
    fn default() -> Self {
        Self {
            comparison_period: ComparisonPeriod::Month,
            min_impressions: 25,
            filter: SignificanceFilter::default(),
        }
    }
}

impl UrlPerformanceConfig {
    pub fn with_comparison_period(mut self, period: ComparisonPeriod) -> Self {
        self.comparison_period = period;
        self
    }

    pub fn with_min_impressions(mut self, min: u64) -> Self {
        self.min_impressions = min;
        self
    }

    pub fn with_filter(mut self, filter: SignificanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_impressions == 0 {
            return Err(AnalysisError::InvalidParameter(
                "min_impressions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One page compared across the two windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlPerformanceRow {
    pub page: String,
    pub impressions_current: u64,
    pub impressions_previous: u64,
    pub impressions_change: i64,
    pub impressions_change_pct: f64,
    pub clicks_current: u64,
    pub clicks_previous: u64,
    pub clicks_change: i64,
    pub clicks_change_pct: f64,
    pub unique_queries_current: usize,
    pub unique_queries_previous: usize,
    pub unique_queries_change: i64,
    pub unique_queries_change_pct: f64,
    pub position_current: Option<f64>,
    pub position_previous: Option<f64>,
    pub position_change: Option<f64>,
    pub significance_score: f64,
    pub is_new: bool,
    pub is_lost: bool,
    pub performance_change: UrlChange,
}

/// Compares page totals between the latest window and the one before.
pub struct UrlPerformanceAnalyzer<'a> {
    historical: &'a Dataset,
    config: UrlPerformanceConfig,
}

impl<'a> UrlPerformanceAnalyzer<'a> {
    pub fn new(historical: &'a Dataset) -> Self {
        Self {
            historical,
            config: UrlPerformanceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: UrlPerformanceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &UrlPerformanceConfig {
        &self.config
    }

    pub fn analyze(&self, recent: &Dataset) -> Result<Vec<UrlPerformanceRow>> {
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
            period = ?self.config.comparison_period,
            "url performance windows"
        );

        if current.is_empty() || previous.is_empty() {
            return Ok(Vec::new());
        }

        let rules = url_rules();
        let min_impressions = self.config.min_impressions;
        let mut rows: Vec<UrlPerformanceRow> =
            outer_join(group_by(&current, page_only), group_by(&previous, page_only))
                .into_iter()
                .map(|(page, cur, prev)| build_row(page, cur.as_ref(), prev.as_ref(), &rules))
                .filter(|row| {
                    row.impressions_current.max(row.impressions_previous) >= min_impressions
                })
                .collect();

        rows.sort_by(|a, b| {
            b.significance_score
                .total_cmp(&a.significance_score)
                .then_with(|| b.impressions_current.cmp(&a.impressions_current))
                .then_with(|| a.page.cmp(&b.page))
        });

        debug!(rows = rows.len(), "url performance computed");
        Ok(rows)
    }
}

fn build_row(
    page: &str,
    cur: Option<&Totals<'_>>,
    prev: Option<&Totals<'_>>,
    rules: &RuleSet<UrlSignals, UrlChange>,
) -> UrlPerformanceRow {
    let imp_cur = cur.map_or(0, |t| t.impressions);
    let imp_prev = prev.map_or(0, |t| t.impressions);
    let clk_cur = cur.map_or(0, |t| t.clicks);
    let clk_prev = prev.map_or(0, |t| t.clicks);
    let q_cur = cur.map_or(0, |t| t.distinct_queries());
    let q_prev = prev.map_or(0, |t| t.distinct_queries());

    let impressions_change_pct = percentage_change(imp_prev as f64, imp_cur as f64);
    let queries_change_pct = percentage_change(q_prev as f64, q_cur as f64);
    let position_current = cur.and_then(|t| t.mean_position());
    let position_previous = prev.and_then(|t| t.mean_position());
    let position_change = position_delta(position_previous, position_current);
    let is_new = imp_prev == 0;
    let is_lost = imp_cur == 0;

    let performance_change = rules.classify(&UrlSignals {
        impressions_change_pct,
        queries_change_pct,
        position_change: position_change.unwrap_or(0.0),
        is_new,
        is_lost,
    });

    UrlPerformanceRow {
        page: page.to_string(),
        impressions_current: imp_cur,
        impressions_previous: imp_prev,
        impressions_change: imp_cur as i64 - imp_prev as i64,
        impressions_change_pct: round_to(impressions_change_pct, 1),
        clicks_current: clk_cur,
        clicks_previous: clk_prev,
        clicks_change: clk_cur as i64 - clk_prev as i64,
        clicks_change_pct: round_to(percentage_change(clk_prev as f64, clk_cur as f64), 1),
        unique_queries_current: q_cur,
        unique_queries_previous: q_prev,
        unique_queries_change: q_cur as i64 - q_prev as i64,
        unique_queries_change_pct: round_to(queries_change_pct, 1),
        position_current: position_current.map(|p| round_to(p, 2)),
        position_previous: position_previous.map(|p| round_to(p, 2)),
        position_change: position_change.map(|p| round_to(p, 2)),
        significance_score: round_to(significance_score(imp_cur as f64, clk_cur as f64), 2),
        is_new,
        is_lost,
        performance_change,
    }
}
