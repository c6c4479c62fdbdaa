//! Queries where several pages of the same site compete for the ranking.

use crate::analysis::aggregate::{group_by, page_only, Totals};
use crate::core::{Dataset, PerformanceRecord};
use crate::error::{AnalysisError, Result};
use crate::scoring::{significance_score, SignificanceFilter};
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Mean-position spread below which competing pages count as close.
const CLOSE_POSITION_SPREAD: f64 = 5.0;
/// Impression share, in percent, that makes a secondary page a competitor.
const SECONDARY_SHARE_PCT: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannibalizationConfig {
    /// Pages with fewer impressions for a query are ignored.
    pub min_impressions: u64,
    /// Position standard deviation above which a page's ranking is volatile.
    pub ranking_volatility_threshold: f64,
    /// Applied to rows before they are grouped by query and page.
    pub filter: SignificanceFilter,
}

impl Default for CannibalizationConfig {
    fn default() -> Self {
        Self {
            min_impressions: 10,
            ranking_volatility_threshold: 2.0,
            filter: SignificanceFilter::default(),
        }
    }
}

impl CannibalizationConfig {
    pub fn with_min_impressions(mut self, min: u64) -> Self {
        self.min_impressions = min;
        self
    }

    pub fn with_ranking_volatility_threshold(mut self, threshold: f64) -> Self {
        self.ranking_volatility_threshold = threshold;
        self
    }

    pub fn with_filter(mut self, filter: SignificanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.ranking_volatility_threshold.is_finite() || self.ranking_volatility_threshold < 0.0
        {
            return Err(AnalysisError::InvalidParameter(format!(
                "ranking_volatility_threshold must be a non-negative number, got {}",
                self.ranking_volatility_threshold
            )));
        }
        Ok(())
    }
}

/// One competing page for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannibalizationRow {
    pub query: String,
    pub page: String,
    pub is_primary: bool,
    /// Page with the best mean position for the query.
    pub primary_page: String,
    pub position: f64,
    /// Standard deviation of position; undefined for a single observation.
    pub position_volatility: Option<f64>,
    pub impressions: u64,
    pub clicks: u64,
    /// Share of the query's impressions, in percent.
    pub impression_share: f64,
    pub days_in_serp: usize,
    pub has_close_positions: bool,
    /// Any page for the query has volatile rankings.
    pub has_volatility: bool,
    pub significance_score: f64,
    /// Number of conflict signals, 1 to 3.
    pub severity: u8,
}

struct PageStats<'a> {
    page: &'a str,
    totals: Totals<'a>,
    position: f64,
}

/// Detects keyword cannibalization.
#[derive(Debug, Clone, Default)]
pub struct CannibalizationDetector {
    config: CannibalizationConfig,
}

impl CannibalizationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CannibalizationConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, data: &Dataset) -> Result<Vec<CannibalizationRow>> {
        self.config.validate()?;

        let mut by_query: BTreeMap<&str, Vec<&PerformanceRecord>> = BTreeMap::new();
        for r in self.config.filter.apply(data) {
            by_query.entry(r.query.as_str()).or_default().push(r);
        }

        let mut out = Vec::new();
        for (query, rows) in by_query {
            let pages: BTreeSet<&str> = rows.iter().map(|r| r.page.as_str()).collect();
            if pages.len() < 2 {
                continue;
            }
            self.score_query(query, &rows, &mut out);
        }

        out.sort_by(|a, b| {
            a.query
                .cmp(&b.query)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.position.total_cmp(&b.position))
                .then_with(|| a.page.cmp(&b.page))
        });

        debug!(rows = out.len(), "cannibalization rows detected");
        Ok(out)
    }

    fn score_query(&self, query: &str, rows: &[&PerformanceRecord], out: &mut Vec<CannibalizationRow>) {
        let min_impressions = self.config.min_impressions;
        let pages: Vec<PageStats<'_>> = group_by(rows, page_only)
            .into_iter()
            .filter(|(_, totals)| totals.impressions >= min_impressions)
            .filter_map(|(page, totals)| {
                let position = totals.mean_position()?;
                Some(PageStats { page, totals, position })
            })
            .collect();

        let total_impressions: u64 = pages.iter().map(|p| p.totals.impressions).sum();
        if pages.len() < 2 || total_impressions < min_impressions.saturating_mul(2) {
            return;
        }

        // Ties on position go to the first URL in order
        let mut primary = &pages[0];
        for p in &pages[1..] {
            if p.position < primary.position {
                primary = p;
            }
        }
        let best = primary.position;
        let worst = pages.iter().map(|p| p.position).fold(f64::MIN, f64::max);
        let has_close_positions = worst - best < CLOSE_POSITION_SPREAD;

        let threshold = self.config.ranking_volatility_threshold;
        let is_volatile = |p: &PageStats<'_>| p.totals.position_std().is_some_and(|s| s > threshold);
        let has_volatility = pages.iter().any(is_volatile);

        for p in &pages {
            let is_primary = p.page == primary.page;
            let share = p.totals.impressions as f64 / total_impressions as f64 * 100.0;

            let mut severity = 0u8;
            if is_volatile(p) {
                severity += 1;
            }
            if has_close_positions {
                severity += 1;
            }
            if !is_primary && share > SECONDARY_SHARE_PCT {
                severity += 1;
            }
            if severity == 0 {
                continue;
            }

            out.push(CannibalizationRow {
                query: query.to_string(),
                page: p.page.to_string(),
                is_primary,
                primary_page: primary.page.to_string(),
                position: round_to(p.position, 2),
                position_volatility: p.totals.position_std().map(|s| round_to(s, 2)),
                impressions: p.totals.impressions,
                clicks: p.totals.clicks,
                impression_share: round_to(share, 1),
                days_in_serp: p.totals.distinct_days(),
                has_close_positions,
                has_volatility,
                significance_score: round_to(
                    significance_score(p.totals.impressions as f64, p.totals.clicks as f64),
                    2,
                ),
                severity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn pricing_scenario() {
        let data = Dataset::new(vec![
            PerformanceRecord::new("/a", "pricing", day(1), 1000, 80, 3.0),
            PerformanceRecord::new("/a", "pricing", day(2), 1000, 80, 3.0),
            PerformanceRecord::new("/b", "pricing", day(1), 400, 10, 4.0),
            PerformanceRecord::new("/b", "pricing", day(2), 400, 10, 4.0),
        ]);
        let rows = CannibalizationDetector::new().analyze(&data).unwrap();
        assert_eq!(rows.len(), 2);

        let b = rows.iter().find(|r| r.page == "/b").unwrap();
        assert!(b.has_close_positions);
        assert!(!b.is_primary);
        assert_eq!(b.primary_page, "/a");
        assert_eq!(b.impression_share, 28.6);
        assert_eq!(b.severity, 2);
        assert_eq!(b.days_in_serp, 2);

        let a = rows.iter().find(|r| r.page == "/a").unwrap();
        assert!(a.is_primary);
        assert_eq!(a.severity, 1);

        // Higher severity first within the query
        assert_eq!(rows[0].page, "/b");
    }

    #[test]
    fn low_volume_rows_do_not_distort_page_stats() {
        let mut rows = Vec::new();
        for d in 1..=5 {
            rows.push(PerformanceRecord::new("/a", "pricing", day(d), 100, 8, 3.0));
            rows.push(PerformanceRecord::new("/b", "pricing", day(d), 100, 4, 4.0));
        }
        rows.push(PerformanceRecord::new("/b", "pricing", day(6), 1, 0, 40.0));
        let data = Dataset::new(rows);

        let rows = CannibalizationDetector::new().analyze(&data).unwrap();
        let b = rows.iter().find(|r| r.page == "/b").unwrap();
        assert_eq!(b.position, 4.0);
        assert_eq!(b.position_volatility, Some(0.0));
        assert_eq!(b.impressions, 500);
        assert_eq!(b.days_in_serp, 5);
        assert!(b.has_close_positions);
        assert!(!b.has_volatility);
    }

    #[test]
    fn single_page_queries_are_ignored() {
        let data = Dataset::new(vec![
            PerformanceRecord::new("/a", "solo", day(1), 5000, 80, 3.0),
            PerformanceRecord::new("/a", "solo", day(2), 5000, 80, 9.0),
        ]);
        assert!(CannibalizationDetector::new().analyze(&data).unwrap().is_empty());
    }

    #[test]
    fn low_volume_pages_are_dropped() {
        let data = Dataset::new(vec![
            PerformanceRecord::new("/a", "q", day(1), 1000, 80, 3.0),
            PerformanceRecord::new("/b", "q", day(1), 5, 1, 3.5),
        ]);
        assert!(CannibalizationDetector::new().analyze(&data).unwrap().is_empty());
    }

    #[test]
    fn distant_stable_pages_are_not_flagged() {
        let data = Dataset::new(vec![
            PerformanceRecord::new("/a", "q", day(1), 1000, 80, 1.0),
            PerformanceRecord::new("/a", "q", day(2), 1000, 80, 1.0),
            PerformanceRecord::new("/b", "q", day(1), 100, 1, 30.0),
            PerformanceRecord::new("/b", "q", day(2), 100, 1, 30.0),
        ]);
        assert!(CannibalizationDetector::new().analyze(&data).unwrap().is_empty());
    }

    #[test]
    fn volatility_adds_severity() {
        let data = Dataset::new(vec![
            PerformanceRecord::new("/a", "q", day(1), 1000, 80, 1.0),
            PerformanceRecord::new("/a", "q", day(2), 1000, 80, 1.0),
            PerformanceRecord::new("/b", "q", day(1), 100, 1, 20.0),
            PerformanceRecord::new("/b", "q", day(2), 100, 1, 40.0),
        ]);
        let rows = CannibalizationDetector::new().analyze(&data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page, "/b");
        assert_eq!(rows[0].severity, 1);
        assert!(rows[0].has_volatility);
        assert!(!rows[0].has_close_positions);
        assert!(rows[0].position_volatility.unwrap() > 2.0);
    }
}
