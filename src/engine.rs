//! End-to-end analysis run.
//!
//! Fits the seasonal model on history, runs every analyzer against the recent
//! dataset, then synthesizes priorities and the summary. An analyzer error is
//! recorded as a failed output and the run continues.

use crate::analysis::{
    CannibalizationDetector, CtrOutlierAnalyzer, KeywordTrendAnalyzer, TrafficChangeAnalyzer,
    UrlPerformanceAnalyzer,
};
use crate::config::EngineConfig;
use crate::core::Dataset;
use crate::error::{AnalysisError, Result};
use crate::report::results::{
    CANNIBALIZATION, CTR_OUTLIERS, DECLINING_KEYWORDS, RISING_KEYWORDS, TRAFFIC_CHANGES,
    URL_PERFORMANCE,
};
use crate::report::{
    summarize, synthesize, AnalysisResults, AnalyzerOutput, PriorityItem, SummaryRow,
};
use crate::seasonality::SeasonalModel;
use tracing::{info, warn};

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub seasonality: SeasonalModel,
    pub results: AnalysisResults,
    pub priorities: Vec<PriorityItem>,
    pub summary: Vec<SummaryRow>,
}

/// Runs the full analysis pipeline.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a validated configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze `recent` against `historical`.
    ///
    /// Fails only on an empty `recent` dataset or records that violate the
    /// schema; an empty history degrades the comparative analyzers to empty
    /// tables.
    pub fn run(&self, recent: &Dataset, historical: &Dataset) -> Result<AnalysisReport> {
        if recent.is_empty() {
            return Err(AnalysisError::EmptyData);
        }
        recent.validate()?;
        historical.validate()?;

        let config = &self.config;
        let model = SeasonalModel::fit(historical, &config.seasonality);
        let mut results = AnalysisResults::new();

        let traffic = TrafficChangeAnalyzer::new(historical, &model)
            .with_config(config.traffic.clone())
            .analyze(recent);
        record(&mut results, TRAFFIC_CHANGES, traffic.map(AnalyzerOutput::TrafficChanges));

        let ctr = CtrOutlierAnalyzer::with_config(historical, config.ctr.clone()).analyze(recent);
        record(&mut results, CTR_OUTLIERS, ctr.map(AnalyzerOutput::CtrOutliers));

        match KeywordTrendAnalyzer::new(historical, &model)
            .with_config(config.keywords.clone())
            .analyze(recent)
        {
            Ok(trends) => {
                results.insert(RISING_KEYWORDS, AnalyzerOutput::Keywords(trends.rising));
                results.insert(DECLINING_KEYWORDS, AnalyzerOutput::Keywords(trends.declining));
            }
            Err(err) => {
                record(&mut results, RISING_KEYWORDS, Err(err.clone()));
                record(&mut results, DECLINING_KEYWORDS, Err(err));
            }
        }

        let cannibalization =
            CannibalizationDetector::with_config(config.cannibalization.clone()).analyze(recent);
        record(
            &mut results,
            CANNIBALIZATION,
            cannibalization.map(AnalyzerOutput::Cannibalization),
        );

        let url = UrlPerformanceAnalyzer::new(historical)
            .with_config(config.url.clone())
            .analyze(recent);
        record(&mut results, URL_PERFORMANCE, url.map(AnalyzerOutput::UrlPerformance));

        let priorities = synthesize(&results, &config.priority);
        let summary = summarize(&results);

        info!(
            recent_rows = recent.len(),
            historical_rows = historical.len(),
            seasonal = model.has_any_seasonality(),
            failed = results.failed().len(),
            priorities = priorities.len(),
            "analysis complete"
        );

        Ok(AnalysisReport {
            seasonality: model,
            results,
            priorities,
            summary,
        })
    }
}

fn record(results: &mut AnalysisResults, name: &str, output: Result<AnalyzerOutput>) {
    let output = output.unwrap_or_else(|err| {
        warn!(analyzer = name, error = %err, "analyzer failed");
        AnalyzerOutput::Failed(err.to_string())
    });
    results.insert(name, output);
}
