//! Core data structures for search-performance analysis.

mod record;
mod series;
mod window;

pub use record::{is_weekend, Dataset, PerformanceRecord};
pub use series::DailySeries;
pub use window::{comparison_windows, weekend_share, ComparisonPeriod, DateWindow};
