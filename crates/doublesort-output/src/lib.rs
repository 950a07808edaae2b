#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/doublesort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod performance;
pub mod summary;

pub use performance::{
    PerformanceAnalyzer, PerformanceConfig, PerformanceError, PerformanceReport, PerformanceStats,
    universe_benchmark,
};
pub use summary::{Metric, MetricGrid};

pub use doublesort_portfolio::SharpeObjective;
