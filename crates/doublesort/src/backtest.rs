//! Backtest runner
//!
//! Ties the pipeline to performance reporting: sort, weight, intersect and
//! aggregate a panel, then score every portfolio against an equal-weighted
//! universe benchmark.

use doublesort_data::{DataError, MarketData, PanelConfig, prepare_market_data};
use doublesort_output::{
    PerformanceAnalyzer, PerformanceConfig, PerformanceError, PerformanceReport,
    universe_benchmark,
};
use doublesort_portfolio::{
    Objective, Pipeline, PipelineConfig, PipelineError, PipelineOutput, ReturnSeries,
};
use polars::prelude::{DataFrame, LazyFrame};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while running a backtest
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Input data could not be read
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Pipeline configuration or search failure
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid performance configuration
    #[error("Performance error: {0}")]
    Performance(#[from] PerformanceError),

    /// Malformed JSON configuration
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for a Backtest
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Bucketing, weighting and intersection parameters
    pub pipeline: PipelineConfig,
    /// Performance statistics parameters
    pub performance: PerformanceConfig,
}

impl BacktestConfig {
    /// Parse a JSON configuration; missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BacktestError> {
        let config: Self = serde_json::from_str(json)?;
        config.pipeline.sorter_config().validate().map_err(PipelineError::from)?;
        config.performance.validate()?;
        Ok(config)
    }
}

/// Output of a backtest
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    /// Buckets, weights, intersections and return series
    pub output: PipelineOutput,
    /// Equal-weighted universe return per date
    pub benchmark: ReturnSeries,
    /// Performance statistics per portfolio
    pub report: PerformanceReport,
}

/// Double-sort backtest
#[derive(Debug)]
pub struct Backtest {
    pipeline: Pipeline,
    analyzer: PerformanceAnalyzer,
}

impl Backtest {
    /// Create a backtest, validating the configuration.
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        Ok(Self {
            pipeline: Pipeline::new(config.pipeline)?,
            analyzer: PerformanceAnalyzer::new(config.performance)?,
        })
    }

    /// Replace the objective used when the weighting scheme is searched.
    pub fn with_objective(mut self, objective: impl Objective + 'static) -> Self {
        self.pipeline = self.pipeline.with_objective(objective);
        self
    }

    /// Run over prepared market data.
    pub fn run(&self, data: &MarketData) -> Result<BacktestResult, BacktestError> {
        let output = self.pipeline.run(data)?;
        let benchmark = universe_benchmark(data);
        let report = self.analyzer.analyze_all(&output.returns, Some(&benchmark));

        info!(
            dates = data.len(),
            scheme = %output.scheme,
            portfolios = report.len(),
            "backtest finished"
        );

        Ok(BacktestResult {
            output,
            benchmark,
            report,
        })
    }

    /// Run over a frame with one row per date and symbol.
    pub fn run_frame(&self, df: &DataFrame) -> Result<BacktestResult, BacktestError> {
        let data = MarketData::from_frame(df)?;
        self.run(&data)
    }

    /// Run over a raw price/volume panel, deriving returns and volatility.
    pub fn run_prices(
        &self,
        raw: LazyFrame,
        panel: &PanelConfig,
    ) -> Result<BacktestResult, BacktestError> {
        let data = prepare_market_data(raw, panel)?;
        self.run(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doublesort_portfolio::{ConflictPolicy, WeightingScheme, WeightingSelection};

    #[test]
    fn test_config_from_json() {
        let config = BacktestConfig::from_json(
            r#"{
                "pipeline": {
                    "return_buckets": 10,
                    "weighting": "best",
                    "conflict_policy": "exclude"
                },
                "performance": {"periods_per_year": 52}
            }"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.return_buckets, 10);
        assert_eq!(config.pipeline.weighting, WeightingSelection::Best);
        assert_eq!(config.pipeline.conflict_policy, ConflictPolicy::Exclude);
        assert_eq!(config.performance.periods_per_year, 52);
        assert_eq!(config.performance.confidence_level, 0.05);
    }

    #[test]
    fn test_config_defaults() {
        let config = BacktestConfig::from_json("{}").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(
            config.pipeline.weighting,
            WeightingSelection::Fixed(WeightingScheme::Equal)
        );
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            BacktestConfig::from_json(r#"{"performance": {"confidence_level": 2.0}}"#),
            Err(BacktestError::Performance(_))
        ));
        assert!(matches!(
            BacktestConfig::from_json(r#"{"pipeline": {"return_buckets": 0}}"#),
            Err(BacktestError::Pipeline(_))
        ));
    }
}
