//! Fusion of analyzer outputs into one ranked list of actions.

use crate::analysis::{ChangeType, UrlChange};
use crate::error::{AnalysisError, Result};
use crate::report::results::{
    AnalysisResults, AnalyzerOutput, CANNIBALIZATION, CTR_OUTLIERS, DECLINING_KEYWORDS,
    RISING_KEYWORDS, TRAFFIC_CHANGES, URL_PERFORMANCE,
};
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Query label for page-level items.
const MULTIPLE_QUERIES: &str = "Multiple queries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    CtrUnderperforming,
    TrafficLoss,
    DecliningKeyword,
    PagePerformanceDecline,
    RisingKeywordOpportunity,
    KeywordCannibalization,
}

impl IssueType {
    pub fn label(&self) -> &'static str {
        match self {
            IssueType::CtrUnderperforming => "CTR Underperforming",
            IssueType::TrafficLoss => "Traffic Loss",
            IssueType::DecliningKeyword => "Declining Keyword",
            IssueType::PagePerformanceDecline => "Page Performance Decline",
            IssueType::RisingKeywordOpportunity => "Rising Keyword Opportunity",
            IssueType::KeywordCannibalization => "Keyword Cannibalization",
        }
    }

    /// Recommended next step for the issue.
    pub fn action(&self) -> &'static str {
        match self {
            IssueType::CtrUnderperforming => "Optimize title/meta description",
            IssueType::TrafficLoss => "Check for ranking drops or indexing issues",
            IssueType::DecliningKeyword => "Update content or improve relevance signals",
            IssueType::PagePerformanceDecline => "Audit page content and technical elements",
            IssueType::RisingKeywordOpportunity => "Optimize further to capitalize on trend",
            IssueType::KeywordCannibalization => "Consolidate or differentiate competing pages",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One actionable finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityItem {
    pub query: String,
    pub page: String,
    pub issue_type: IssueType,
    pub action: String,
    pub priority_score: f64,
    pub details: String,
}

impl PriorityItem {
    fn new(
        issue_type: IssueType,
        query: &str,
        page: &str,
        priority_score: f64,
        details: String,
    ) -> Self {
        Self {
            query: query.to_string(),
            page: page.to_string(),
            issue_type,
            action: issue_type.action().to_string(),
            priority_score: round_to(priority_score, 1),
            details,
        }
    }
}

/// Thresholds for promoting analyzer rows to priority items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Minimum significance (or keyword score) for inclusion.
    pub threshold: f64,
    /// CTR shortfall, in percent of expected, that counts as an issue.
    pub ctr_drop_pct: f64,
    /// Impressions loss, in percent, that counts as a traffic issue.
    pub traffic_drop_pct: f64,
    /// Impressions loss, in percent, that counts as a declining keyword.
    pub keyword_drop_pct: f64,
    /// Impressions growth, in percent, that counts as an opportunity.
    pub rising_growth_pct: f64,
    /// Minimum severity for a competing page to be reported.
    pub cannibalization_min_severity: u8,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            threshold: 40.0,
            ctr_drop_pct: 15.0,
            traffic_drop_pct: 20.0,
            keyword_drop_pct: 30.0,
            rising_growth_pct: 50.0,
            cannibalization_min_severity: 2,
        }
    }
}

impl PriorityConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cannibalization_min_severity(mut self, severity: u8) -> Self {
        self.cannibalization_min_severity = severity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let pcts = [
            ("threshold", self.threshold),
            ("ctr_drop_pct", self.ctr_drop_pct),
            ("traffic_drop_pct", self.traffic_drop_pct),
            ("keyword_drop_pct", self.keyword_drop_pct),
            ("rising_growth_pct", self.rising_growth_pct),
        ];
        for (name, value) in pcts {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::InvalidParameter(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Look up a named source, logging why it cannot be used.
fn source<'r, T>(
    results: &'r AnalysisResults,
    name: &str,
    extract: fn(&'r AnalyzerOutput) -> Option<&'r [T]>,
) -> Option<&'r [T]> {
    let output = results.get(name)?;
    if let AnalyzerOutput::Failed(reason) = output {
        warn!(source = name, reason = %reason, "skipping failed source");
        return None;
    }
    let rows = extract(output);
    if rows.is_none() {
        warn!(source = name, kind = output.kind(), "skipping source with unexpected output kind");
    }
    rows
}

/// Whether every row carries a usable value; logs the mismatch otherwise.
fn well_formed<T>(name: &str, rows: &[T], value: impl Fn(&T) -> Option<f64>) -> bool {
    let ok = rows.iter().all(|r| value(r).is_some_and(f64::is_finite));
    if !ok {
        warn!(source = name, "skipping source with missing or non-finite scores");
    }
    ok
}

fn ctr_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, CTR_OUTLIERS, AnalyzerOutput::as_ctr_outliers) else {
        return Vec::new();
    };
    if !well_formed(CTR_OUTLIERS, rows, |r| Some(r.significance_score)) {
        return Vec::new();
    }
    rows.iter()
        .filter(|r| {
            r.is_underperforming
                && r.significance_score >= config.threshold
                && r.ctr_difference_pct <= -config.ctr_drop_pct
        })
        .map(|r| {
            PriorityItem::new(
                IssueType::CtrUnderperforming,
                &r.query,
                &r.page,
                r.significance_score * r.ctr_difference_pct.abs() / 100.0,
                format!(
                    "Position: {:.1}, CTR: {:.1}% vs Expected: {:.1}%",
                    r.avg_position,
                    r.actual_ctr * 100.0,
                    r.expected_ctr * 100.0
                ),
            )
        })
        .collect()
}

fn traffic_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, TRAFFIC_CHANGES, AnalyzerOutput::as_traffic_changes) else {
        return Vec::new();
    };
    if !well_formed(TRAFFIC_CHANGES, rows, |r| Some(r.significance_score)) {
        return Vec::new();
    }
    rows.iter()
        .filter(|r| {
            r.impressions_change_pct <= -config.traffic_drop_pct
                && r.significance_score >= config.threshold
                && !matches!(
                    r.change_type,
                    ChangeType::SeasonalDecrease | ChangeType::WeekendDecrease
                )
        })
        .map(|r| {
            PriorityItem::new(
                IssueType::TrafficLoss,
                &r.query,
                &r.page,
                r.significance_score * r.impressions_change_pct.abs() / 100.0,
                format!(
                    "Impressions: {} (down {:.1}%), Position change: {:.1}",
                    r.impressions_current,
                    r.impressions_change_pct.abs(),
                    r.position_change.unwrap_or(0.0)
                ),
            )
        })
        .collect()
}

fn declining_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, DECLINING_KEYWORDS, AnalyzerOutput::as_keywords) else {
        return Vec::new();
    };
    if !well_formed(DECLINING_KEYWORDS, rows, |r| Some(r.significance_score))
        || !well_formed(DECLINING_KEYWORDS, rows, |r| r.risk_score)
    {
        return Vec::new();
    }
    rows.iter()
        .filter(|r| {
            r.impressions_change_pct <= -config.keyword_drop_pct
                && r.significance_score >= config.threshold
        })
        .map(|r| {
            PriorityItem::new(
                IssueType::DecliningKeyword,
                &r.query,
                &r.page,
                r.risk_score.unwrap_or(0.0),
                format!(
                    "Impressions: {} (down {:.1}%), Previously: {}",
                    r.impressions_current,
                    r.impressions_change_pct.abs(),
                    r.impressions_previous
                ),
            )
        })
        .collect()
}

fn url_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, URL_PERFORMANCE, AnalyzerOutput::as_url_performance) else {
        return Vec::new();
    };
    if !well_formed(URL_PERFORMANCE, rows, |r| Some(r.significance_score)) {
        return Vec::new();
    }
    rows.iter()
        .filter(|r| {
            matches!(
                r.performance_change,
                UrlChange::SignificantDecline
                    | UrlChange::MajorTrafficLoss
                    | UrlChange::ModerateTrafficLoss
                    | UrlChange::LosingQueryDiversity
            ) && r.significance_score >= config.threshold
        })
        .map(|r| {
            PriorityItem::new(
                IssueType::PagePerformanceDecline,
                MULTIPLE_QUERIES,
                &r.page,
                r.significance_score * r.impressions_change_pct.abs() / 100.0,
                format!(
                    "Lost {} impressions ({:.1}%), Position change: {:.1}",
                    r.impressions_change.unsigned_abs(),
                    r.impressions_change_pct.abs(),
                    r.position_change.unwrap_or(0.0)
                ),
            )
        })
        .collect()
}

fn rising_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, RISING_KEYWORDS, AnalyzerOutput::as_keywords) else {
        return Vec::new();
    };
    if !well_formed(RISING_KEYWORDS, rows, |r| r.opportunity_score) {
        return Vec::new();
    }
    rows.iter()
        .filter_map(|r| {
            let score = r.opportunity_score?;
            (score >= config.threshold && r.impressions_change_pct >= config.rising_growth_pct)
                .then_some((r, score))
        })
        .map(|(r, score)| {
            let position = r
                .position_current
                .map_or_else(|| "n/a".to_string(), |p| format!("{p:.1}"));
            PriorityItem::new(
                IssueType::RisingKeywordOpportunity,
                &r.query,
                &r.page,
                score,
                format!(
                    "Impressions: {} (up {:.1}%), Position: {}",
                    r.impressions_current, r.impressions_change_pct, position
                ),
            )
        })
        .collect()
}

fn cannibalization_items(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let Some(rows) = source(results, CANNIBALIZATION, AnalyzerOutput::as_cannibalization) else {
        return Vec::new();
    };
    if !well_formed(CANNIBALIZATION, rows, |r| Some(r.significance_score)) {
        return Vec::new();
    }
    rows.iter()
        .filter(|r| {
            !r.is_primary
                && r.severity >= config.cannibalization_min_severity
                && r.significance_score >= config.threshold
        })
        .map(|r| {
            PriorityItem::new(
                IssueType::KeywordCannibalization,
                &r.query,
                &r.page,
                r.significance_score * f64::from(r.severity) / 3.0,
                format!(
                    "Position: {:.1}, Impression share: {:.1}%, Competes with: {}",
                    r.position, r.impression_share, r.primary_page
                ),
            )
        })
        .collect()
}

/// Re-filter every named source and merge the survivors by priority.
///
/// A source that is absent, failed, of the wrong kind, or carries unusable
/// scores contributes nothing; the others are unaffected.
pub fn synthesize(results: &AnalysisResults, config: &PriorityConfig) -> Vec<PriorityItem> {
    let mut items = Vec::new();
    items.extend(ctr_items(results, config));
    items.extend(traffic_items(results, config));
    items.extend(declining_items(results, config));
    items.extend(url_items(results, config));
    items.extend(rising_items(results, config));
    items.extend(cannibalization_items(results, config));

    items.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.issue_type.label().cmp(b.issue_type.label()))
            .then_with(|| a.query.cmp(&b.query))
            .then_with(|| a.page.cmp(&b.page))
    });

    debug!(items = items.len(), "priority items synthesized");
    items
}
