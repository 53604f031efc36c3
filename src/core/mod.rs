//! Domain logic: records, rates, windows and the analytics built on them

pub mod analytics;
pub mod cache;
pub mod config;
pub mod format;
pub mod listing;
pub mod log;
pub mod pulse;
pub mod rates;
pub mod report;
pub mod transaction;
pub mod trend;
pub mod window;

// Re-export main types for cleaner imports
pub use analytics::AggregationEngine;
pub use cache::TransactionStore;
pub use rates::RateTable;
pub use transaction::{CachedTransaction, StatusClass};
pub use window::{Interval, PeriodWindow};
