//! Seasonality detection and adjustment.
//!
//! This module provides:
//! - Classical additive decomposition at weekly and monthly periods
//! - A fitted, immutable [`SeasonalModel`] with day-of-week ratios and
//!   per page/query weekly patterns
//! - The [`SeasonalityOracle`] capability injected into comparative analyzers

mod decompose;
mod model;
mod oracle;

pub use decompose::{ClassicalDecomposition, Decomposition};
pub use model::{
    DayOfWeekPatterns, MetricPattern, PageQueryPattern, PeriodPatterns, SeasonalModel,
    SeasonalityConfig,
};
pub use oracle::{NoSeasonality, SeasonalityOracle};
