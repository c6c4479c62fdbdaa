//! # search-signals
//!
//! Multi-signal analytics over search-performance data.
//!
//! Takes page × query × date records (impressions, clicks, CTR, position)
//! and produces traffic changes, CTR outliers, rising and declining
//! keywords, cannibalization conflicts and page-level shifts, fused into a
//! ranked list of actions. A fitted seasonal model keeps weekday and
//! weekly effects from being reported as problems.

#![allow(clippy::too_many_arguments)]

pub mod analysis;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod report;
pub mod scoring;
pub mod seasonality;
pub mod utils;

pub use error::{AnalysisError, Result};

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::{ComparisonPeriod, Dataset, PerformanceRecord};
    pub use crate::engine::{AnalysisReport, Engine};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::report::{AnalysisResults, AnalyzerOutput, PriorityItem, SummaryRow};
    pub use crate::scoring::{significance_score, SignificanceFilter};
    pub use crate::seasonality::{NoSeasonality, SeasonalModel, SeasonalityOracle};
}
