#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/doublesort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backtest;

// Re-export main types from sub-crates
pub use doublesort_data as data;
pub use doublesort_output as output;
pub use doublesort_portfolio as portfolio;
pub use doublesort_signals as signals;

pub use backtest::{Backtest, BacktestConfig, BacktestError, BacktestResult};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
