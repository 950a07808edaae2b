//! End-to-end pipeline: sort, weight, intersect and aggregate a panel.

use crate::intersection::{ConflictPolicy, IntersectionGrid, Intersector, PortfolioLabel};
use crate::search::{
    BestMethodSearch, Objective, SchemeRun, SchemeScore, SearchError, SharpeObjective,
    evaluate_scheme,
};
use crate::series::PortfolioReturns;
use crate::weighting::{SchemeRegistry, WeightedBucketSet, WeightingError, WeightingScheme};
use doublesort_data::MarketData;
use doublesort_signals::{BucketSet, BucketSorter, SignalError, SorterConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Errors raised while configuring or running the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid bucket counts
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Unknown weighting scheme
    #[error(transparent)]
    Weighting(#[from] WeightingError),

    /// Best-method search failed
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Malformed JSON configuration
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// How the weighting scheme is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingSelection {
    /// Always use one scheme
    Fixed(WeightingScheme),
    /// Try every scheme and keep the best under the objective
    Best,
}

impl Default for WeightingSelection {
    fn default() -> Self {
        Self::Fixed(WeightingScheme::Equal)
    }
}

impl fmt::Display for WeightingSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(scheme) => write!(f, "{scheme}"),
            Self::Best => f.write_str("best"),
        }
    }
}

impl FromStr for WeightingSelection {
    type Err = WeightingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "best" {
            return Ok(Self::Best);
        }
        s.parse().map(Self::Fixed)
    }
}

/// Pipeline parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of return buckets (default: 5)
    pub return_buckets: usize,
    /// Number of volume buckets (default: 3)
    pub volume_buckets: usize,
    /// Weighting scheme selection (default: equal)
    pub weighting: WeightingSelection,
    /// Treatment of opposite-side rows in intersections
    pub conflict_policy: ConflictPolicy,
    /// Per-period risk-free rate used by the Sharpe objective
    pub risk_free_rate: f64,
    /// Process dates and schemes on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let sorter = SorterConfig::default();
        Self {
            return_buckets: sorter.return_buckets,
            volume_buckets: sorter.volume_buckets,
            weighting: WeightingSelection::default(),
            conflict_policy: ConflictPolicy::default(),
            risk_free_rate: 0.0,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.sorter_config().validate()?;
        Ok(config)
    }

    /// Bucket counts for the sorter.
    pub const fn sorter_config(&self) -> SorterConfig {
        SorterConfig {
            return_buckets: self.return_buckets,
            volume_buckets: self.volume_buckets,
        }
    }
}

/// Output of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Scheme the portfolios were weighted with
    pub scheme: WeightingScheme,
    /// Buckets per date
    pub buckets: Vec<BucketSet>,
    /// Weighted buckets per date
    pub weighted: Vec<WeightedBucketSet>,
    /// Intersection portfolios per date
    pub intersections: IntersectionGrid,
    /// Return series per portfolio
    pub returns: PortfolioReturns,
    /// Candidate scores when the scheme was searched
    pub ranking: Vec<SchemeScore>,
    /// Best portfolio under the objective, when searched
    pub best_portfolio: Option<PortfolioLabel>,
}

impl PipelineOutput {
    fn from_run(buckets: Vec<BucketSet>, run: SchemeRun) -> Self {
        Self {
            scheme: run.scheme,
            buckets,
            weighted: run.weighted,
            intersections: run.intersections,
            returns: run.returns,
            ranking: Vec::new(),
            best_portfolio: None,
        }
    }
}

/// Double-sort backtest pipeline
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    sorter: BucketSorter,
    registry: SchemeRegistry,
    objective: Box<dyn Objective>,
}

impl Pipeline {
    /// Create a pipeline, validating the configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let sorter = BucketSorter::new(config.sorter_config())?;
        Ok(Self {
            config,
            sorter,
            registry: SchemeRegistry::standard(),
            objective: Box::new(SharpeObjective::new(config.risk_free_rate)),
        })
    }

    /// Replace the objective used by the best-method search.
    pub fn with_objective(mut self, objective: impl Objective + 'static) -> Self {
        self.objective = Box::new(objective);
        self
    }

    /// Pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Bucket every date of the panel.
    pub fn sort(&self, data: &MarketData) -> Vec<BucketSet> {
        let sections: Vec<_> = data.iter().collect();
        if self.config.parallel {
            sections
                .par_iter()
                .map(|section| self.sorter.sort(section))
                .collect()
        } else {
            sections
                .iter()
                .map(|section| self.sorter.sort(section))
                .collect()
        }
    }

    /// Run the whole pipeline over a panel.
    ///
    /// # Arguments
    ///
    /// * `data` - Cross-sections keyed by rebalancing date
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use doublesort_data::{CrossSection, MarketData, SecurityObservation};
    /// use doublesort_portfolio::{
    ///     Pipeline, PipelineConfig, PortfolioLabel, WeightingScheme, WeightingSelection,
    /// };
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    /// let section = CrossSection::new(
    ///     date,
    ///     vec![
    ///         SecurityObservation::new("A", 10.0, 500.0, 0.03),
    ///         SecurityObservation::new("B", 20.0, 100.0, -0.01),
    ///         SecurityObservation::new("C", 30.0, 300.0, 0.02),
    ///         SecurityObservation::new("D", 40.0, 200.0, 0.00),
    ///     ],
    /// );
    /// let data: MarketData = [section].into_iter().collect();
    ///
    /// let pipeline = Pipeline::new(PipelineConfig {
    ///     return_buckets: 2,
    ///     volume_buckets: 1,
    ///     weighting: WeightingSelection::Fixed(WeightingScheme::Equal),
    ///     ..Default::default()
    /// })
    /// .unwrap();
    /// let output = pipeline.run(&data).unwrap();
    ///
    /// // A and C each weigh 1/2 + 1/4
    /// let label: PortfolioLabel = "R2_V1".parse().unwrap();
    /// let period = output.returns.get(&label).unwrap().get(&date).unwrap();
    /// assert!((period - 0.75 * (0.03 + 0.02)).abs() < 1e-12);
    /// ```
    pub fn run(&self, data: &MarketData) -> Result<PipelineOutput, PipelineError> {
        let buckets = self.sort(data);
        let intersector = Intersector::new(self.config.conflict_policy);

        match self.config.weighting {
            WeightingSelection::Fixed(scheme) => {
                let weighting = self
                    .registry
                    .get(scheme)
                    .ok_or_else(|| WeightingError::UnknownScheme(scheme.to_string()))?;
                let run = evaluate_scheme(&buckets, weighting, &intersector, self.config.parallel);
                info!(
                    %scheme,
                    dates = run.intersections.len(),
                    portfolios = run.returns.len(),
                    "pipeline finished"
                );
                Ok(PipelineOutput::from_run(buckets, run))
            }
            WeightingSelection::Best => {
                let outcome = BestMethodSearch::all(self.config.conflict_policy)
                    .with_parallel(self.config.parallel)
                    .run(&buckets, self.objective.as_ref())?;
                let mut output = PipelineOutput::from_run(buckets, outcome.run);
                output.ranking = outcome.ranking;
                output.best_portfolio = Some(outcome.portfolio);
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("best", WeightingSelection::Best)]
    #[case("equi", WeightingSelection::Fixed(WeightingScheme::Equal))]
    #[case("vol", WeightingSelection::Fixed(WeightingScheme::InverseVolatility))]
    fn test_selection_from_str(#[case] text: &str, #[case] expected: WeightingSelection) {
        assert_eq!(text.parse::<WeightingSelection>().unwrap(), expected);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config = PipelineConfig::from_json(
            r#"{
                "return_buckets": 10,
                "weighting": {"fixed": "dollar_volume"},
                "conflict_policy": "net"
            }"#,
        )
        .unwrap();
        assert_eq!(config.return_buckets, 10);
        assert_eq!(config.volume_buckets, 3);
        assert_eq!(
            config.weighting,
            WeightingSelection::Fixed(WeightingScheme::DollarVolume)
        );
        assert_eq!(config.conflict_policy, ConflictPolicy::Net);
        assert!(config.parallel);

        let config = PipelineConfig::from_json(r#"{"weighting": "best"}"#).unwrap();
        assert_eq!(config.weighting, WeightingSelection::Best);
    }

    #[rstest]
    #[case(r#"{"volume_buckets": 0}"#)]
    #[case(r#"{"weighting": {"fixed": "markowitz"}}"#)]
    #[case("not json")]
    fn test_config_from_json_rejects(#[case] json: &str) {
        assert!(PipelineConfig::from_json(json).is_err());
    }

    #[test]
    fn test_new_rejects_zero_buckets() {
        let config = PipelineConfig {
            return_buckets: 0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Signal(_))
        ));
    }
}
