//! Errors surfaced by the analyzers and the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failure of an analysis run or a single analyzer.
///
/// Thin data is not an error: analyzers return an empty table instead.
/// Only bad configuration and records outside the canonical schema reach
/// the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The dataset under analysis has no records.
    #[error("no performance records to analyze")]
    EmptyData,

    /// A decomposition got a series shorter than it requires.
    #[error("series too short: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidParameter(String),

    /// A record violates the performance-record schema.
    #[error("record {index} rejected: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Decomposition produced non-finite components.
    #[error("decomposition failed: {0}")]
    ComputationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            AnalysisError::EmptyData.to_string(),
            "no performance records to analyze"
        );
        assert_eq!(
            AnalysisError::InsufficientData { needed: 14, got: 9 }.to_string(),
            "series too short: need 14 points, got 9"
        );
        assert_eq!(
            AnalysisError::InvalidParameter("trend_period_days must be positive".into()).to_string(),
            "invalid configuration: trend_period_days must be positive"
        );
        assert_eq!(
            AnalysisError::InvalidRecord {
                index: 3,
                reason: "position must be >= 1".into(),
            }
            .to_string(),
            "record 3 rejected: position must be >= 1"
        );
    }

    #[test]
    fn failures_can_be_recorded_twice() {
        // The engine stores one keyword failure under both keyword tables.
        let err = AnalysisError::ComputationError("nan residual".into());
        assert_eq!(err.clone(), err);
    }
}
