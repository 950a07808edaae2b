#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/doublesort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod intersection;
pub mod pipeline;
pub mod search;
pub mod series;
pub mod weighting;

pub use aggregate::{aggregate, aggregate_date, period_return};
pub use intersection::{
    ConflictPolicy, DatedIntersections, HoldingRecord, IntersectionError, IntersectionGrid,
    IntersectionPortfolio, IntersectionRow, Intersector, PortfolioLabel, RowSource,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput, WeightingSelection};
pub use search::{
    BestMethodSearch, Objective, SchemeRun, SchemeScore, SearchError, SearchOutcome,
    SharpeObjective, evaluate_scheme,
};
pub use series::{PortfolioReturns, ReturnObservation, ReturnSeries, SeriesError};
pub use weighting::{
    SchemeRegistry, WeightedBucket, WeightedBucketSet, WeightedEntry, Weighting, WeightingError,
    WeightingScheme, weight_set,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
