//! Named analyzer outputs handed to the synthesizer and the summary.

use crate::analysis::{
    CannibalizationRow, CtrOutlierRow, KeywordTrendRow, TrafficChangeRow, UrlPerformanceRow,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CTR_OUTLIERS: &str = "ctr_outliers";
pub const TRAFFIC_CHANGES: &str = "traffic_changes";
pub const RISING_KEYWORDS: &str = "rising_keywords";
pub const DECLINING_KEYWORDS: &str = "declining_keywords";
pub const CANNIBALIZATION: &str = "cannibalization";
pub const URL_PERFORMANCE: &str = "url_performance";

/// The table one analyzer produced, or why it produced none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum AnalyzerOutput {
    TrafficChanges(Vec<TrafficChangeRow>),
    CtrOutliers(Vec<CtrOutlierRow>),
    Keywords(Vec<KeywordTrendRow>),
    Cannibalization(Vec<CannibalizationRow>),
    UrlPerformance(Vec<UrlPerformanceRow>),
    Failed(String),
}

impl AnalyzerOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzerOutput::TrafficChanges(_) => "traffic_changes",
            AnalyzerOutput::CtrOutliers(_) => "ctr_outliers",
            AnalyzerOutput::Keywords(_) => "keywords",
            AnalyzerOutput::Cannibalization(_) => "cannibalization",
            AnalyzerOutput::UrlPerformance(_) => "url_performance",
            AnalyzerOutput::Failed(_) => "failed",
        }
    }

    /// Number of rows; a failed analyzer has none.
    pub fn len(&self) -> usize {
        match self {
            AnalyzerOutput::TrafficChanges(rows) => rows.len(),
            AnalyzerOutput::CtrOutliers(rows) => rows.len(),
            AnalyzerOutput::Keywords(rows) => rows.len(),
            AnalyzerOutput::Cannibalization(rows) => rows.len(),
            AnalyzerOutput::UrlPerformance(rows) => rows.len(),
            AnalyzerOutput::Failed(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnalyzerOutput::Failed(_))
    }

    pub(crate) fn as_traffic_changes(&self) -> Option<&[TrafficChangeRow]> {
        match self {
            AnalyzerOutput::TrafficChanges(rows) => Some(rows),
            _ => None,
        }
    }

    pub(crate) fn as_ctr_outliers(&self) -> Option<&[CtrOutlierRow]> {
        match self {
            AnalyzerOutput::CtrOutliers(rows) => Some(rows),
            _ => None,
        }
    }

    pub(crate) fn as_keywords(&self) -> Option<&[KeywordTrendRow]> {
        match self {
            AnalyzerOutput::Keywords(rows) => Some(rows),
            _ => None,
        }
    }

    pub(crate) fn as_cannibalization(&self) -> Option<&[CannibalizationRow]> {
        match self {
            AnalyzerOutput::Cannibalization(rows) => Some(rows),
            _ => None,
        }
    }

    pub(crate) fn as_url_performance(&self) -> Option<&[UrlPerformanceRow]> {
        match self {
            AnalyzerOutput::UrlPerformance(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Analyzer outputs keyed by source name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    outputs: BTreeMap<String, AnalyzerOutput>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, output: AnalyzerOutput) {
        self.outputs.insert(name.into(), output);
    }

    pub fn with(mut self, name: impl Into<String>, output: AnalyzerOutput) -> Self {
        self.insert(name, output);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AnalyzerOutput> {
        self.outputs.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<AnalyzerOutput> {
        self.outputs.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnalyzerOutput)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Names of sources whose analyzer failed.
    pub fn failed(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, out)| out.is_failed())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn traffic_changes(&self) -> Option<&[TrafficChangeRow]> {
        self.get(TRAFFIC_CHANGES)?.as_traffic_changes()
    }

    pub fn ctr_outliers(&self) -> Option<&[CtrOutlierRow]> {
        self.get(CTR_OUTLIERS)?.as_ctr_outliers()
    }

    pub fn rising_keywords(&self) -> Option<&[KeywordTrendRow]> {
        self.get(RISING_KEYWORDS)?.as_keywords()
    }

    pub fn declining_keywords(&self) -> Option<&[KeywordTrendRow]> {
        self.get(DECLINING_KEYWORDS)?.as_keywords()
    }

    pub fn cannibalization(&self) -> Option<&[CannibalizationRow]> {
        self.get(CANNIBALIZATION)?.as_cannibalization()
    }

    pub fn url_performance(&self) -> Option<&[UrlPerformanceRow]> {
        self.get(URL_PERFORMANCE)?.as_url_performance()
    }
}
