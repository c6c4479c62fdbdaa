//! Headline counts per analyzer.

use crate::analysis::UrlChange;
use crate::report::results::AnalysisResults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const NONE: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub category: String,
    pub metric: String,
    pub count: usize,
    pub details: String,
}

impl SummaryRow {
    fn new(category: &str, metric: &str, count: usize, details: String) -> Self {
        Self {
            category: category.to_string(),
            metric: metric.to_string(),
            count,
            details,
        }
    }
}

fn first_or_none<'a>(mut names: impl Iterator<Item = &'a str>) -> &'a str {
    names.next().unwrap_or(NONE)
}

/// Summarize each non-empty source; failed or absent sources are left out.
///
/// Rows within a source keep the analyzer's order, so the first match is the
/// most significant one.
pub fn summarize(results: &AnalysisResults) -> Vec<SummaryRow> {
    let mut summary = Vec::new();

    if let Some(rows) = results.traffic_changes().filter(|r| !r.is_empty()) {
        let increases = rows.iter().filter(|r| r.impressions_change > 0);
        let decreases = rows.iter().filter(|r| r.impressions_change < 0);
        summary.push(SummaryRow::new(
            "Traffic Changes",
            "Increases",
            increases.clone().count(),
            format!("Top query: {}", first_or_none(increases.map(|r| r.query.as_str()))),
        ));
        summary.push(SummaryRow::new(
            "Traffic Changes",
            "Decreases",
            decreases.clone().count(),
            format!("Top query: {}", first_or_none(decreases.map(|r| r.query.as_str()))),
        ));
    }

    if let Some(rows) = results.ctr_outliers().filter(|r| !r.is_empty()) {
        let under = rows.iter().filter(|r| r.is_underperforming);
        let over = rows.iter().filter(|r| r.is_overperforming);
        summary.push(SummaryRow::new(
            "CTR Performance",
            "Underperforming",
            under.clone().count(),
            format!("Highest impact: {}", first_or_none(under.map(|r| r.query.as_str()))),
        ));
        summary.push(SummaryRow::new(
            "CTR Performance",
            "Overperforming",
            over.clone().count(),
            format!("Highest impact: {}", first_or_none(over.map(|r| r.query.as_str()))),
        ));
    }

    if let Some(rows) = results.rising_keywords().filter(|r| !r.is_empty()) {
        summary.push(SummaryRow::new(
            "Keyword Trends",
            "Rising Keywords",
            rows.len(),
            format!("Top opportunity: {}", rows[0].query),
        ));
    }

    if let Some(rows) = results.declining_keywords().filter(|r| !r.is_empty()) {
        summary.push(SummaryRow::new(
            "Keyword Trends",
            "Declining Keywords",
            rows.len(),
            format!("Highest risk: {}", rows[0].query),
        ));
    }

    if let Some(rows) = results.cannibalization().filter(|r| !r.is_empty()) {
        let queries: BTreeSet<&str> = rows.iter().map(|r| r.query.as_str()).collect();
        summary.push(SummaryRow::new(
            "Cannibalization",
            "Issues Detected",
            rows.len(),
            format!("Affecting {} unique queries", queries.len()),
        ));
    }

    if let Some(rows) = results.url_performance().filter(|r| !r.is_empty()) {
        let improving = rows.iter().filter(|r| {
            matches!(
                r.performance_change,
                UrlChange::SignificantImprovement
                    | UrlChange::MajorTrafficGain
                    | UrlChange::ModerateTrafficGain
            )
        });
        let declining = rows.iter().filter(|r| {
            matches!(
                r.performance_change,
                UrlChange::SignificantDecline
                    | UrlChange::MajorTrafficLoss
                    | UrlChange::ModerateTrafficLoss
            )
        });
        let new = rows.iter().filter(|r| r.is_new);
        let lost = rows.iter().filter(|r| r.is_lost);

        summary.push(SummaryRow::new(
            "URL Performance",
            "Improving URLs",
            improving.clone().count(),
            format!("Top URL: {}", first_or_none(improving.map(|r| r.page.as_str()))),
        ));
        summary.push(SummaryRow::new(
            "URL Performance",
            "Declining URLs",
            declining.clone().count(),
            format!("Most affected: {}", first_or_none(declining.map(|r| r.page.as_str()))),
        ));

        let new_count = new.clone().count();
        if new_count > 0 {
            summary.push(SummaryRow::new(
                "URL Performance",
                "New URLs",
                new_count,
                format!("Top new URL: {}", first_or_none(new.map(|r| r.page.as_str()))),
            ));
        }
        let lost_count = lost.clone().count();
        if lost_count > 0 {
            summary.push(SummaryRow::new(
                "URL Performance",
                "Lost URLs",
                lost_count,
                format!("Most significant loss: {}", first_or_none(lost.map(|r| r.page.as_str()))),
            ));
        }
    }

    summary
}
