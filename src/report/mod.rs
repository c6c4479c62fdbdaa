//! Reporting over analyzer outputs.
//!
//! - [`AnalysisResults`]: the named analyzer tables
//! - [`synthesize`]: the ranked priority list
//! - [`summarize`]: headline counts per analyzer

mod priority;
pub mod results;
mod summary;

pub use priority::{synthesize, IssueType, PriorityConfig, PriorityItem};
pub use results::{AnalysisResults, AnalyzerOutput};
pub use summary::{summarize, SummaryRow};
