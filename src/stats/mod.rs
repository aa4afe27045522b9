//! Classification and monthly aggregation.
//!
//! - **`patterns`**: once-compiled IPv4/IPv6 matchers for the auth header.
//! - **`classifier`**: exclusion rules, address family, TLS and provider overlays.
//! - **`aggregate`**: `MonthKey`, `StatisticGroup`, the month map and run summary.
//! - **`report`**: CSV rendering of the month map.

pub mod aggregate;
pub mod classifier;
pub mod patterns;
pub mod report;

pub use aggregate::{MonthKey, MonthlyStats, RunSummary, StatisticGroup};
pub use classifier::{Classification, Classifier, Verdict};
pub use patterns::IpFamily;
pub use report::CsvReport;
