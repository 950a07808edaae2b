//! Performance statistics of portfolio return series.
//!
//! Every statistic is `None` when it is undefined for the input: too few
//! observations, a zero deviation, or no overlap with the benchmark.

use chrono::NaiveDate;
use doublesort_data::MarketData;
use doublesort_portfolio::{PortfolioLabel, PortfolioReturns, ReturnSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised when configuring the analyzer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerformanceError {
    /// Annualisation needs at least one period per year
    #[error("Invalid periods per year: {0}")]
    InvalidPeriodsPerYear(u32),

    /// VaR confidence level must lie in (0, 1)
    #[error("Invalid confidence level: {0} (must be in (0, 1))")]
    InvalidConfidenceLevel(f64),

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for the PerformanceAnalyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Rebalancing periods per year (default: 12)
    pub periods_per_year: u32,
    /// Per-period risk-free rate (default: 0.0)
    pub risk_free_rate: f64,
    /// Tail probability for VaR (default: 0.05)
    pub confidence_level: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 12,
            risk_free_rate: 0.0,
            confidence_level: 0.05,
        }
    }
}

impl PerformanceConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<(), PerformanceError> {
        if self.periods_per_year == 0 {
            return Err(PerformanceError::InvalidPeriodsPerYear(self.periods_per_year));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PerformanceError::InvalidConfidenceLevel(
                self.confidence_level,
            ));
        }
        Ok(())
    }
}

/// Compounded return over all periods.
pub fn total_return(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    Some(returns.iter().fold(1.0, |wealth, r| wealth * (1.0 + r)) - 1.0)
}

/// Geometric annualisation of a compounded return over `periods` periods.
pub fn annualized_return(total: f64, periods: usize, periods_per_year: u32) -> Option<f64> {
    if periods == 0 || total <= -1.0 {
        return None;
    }
    let value = (1.0 + total).powf(f64::from(periods_per_year) / periods as f64) - 1.0;
    value.is_finite().then_some(value)
}

/// Sample standard deviation.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

/// Largest peak-to-trough loss of the wealth curve, as a non-positive fraction.
pub fn max_drawdown(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        if peak > 0.0 {
            worst = worst.min(wealth / peak - 1.0);
        }
    }
    Some(worst)
}

/// Linear-interpolated percentile, `q` in `[0, 1]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Historical value at risk: the `confidence_level` percentile of returns.
///
/// Losses are negative.
pub fn value_at_risk(returns: &[f64], confidence_level: f64) -> Option<f64> {
    percentile(returns, confidence_level)
}

/// Differences between a series and a benchmark on their shared dates.
pub fn active_returns(series: &ReturnSeries, benchmark: &ReturnSeries) -> Vec<f64> {
    series
        .observations()
        .iter()
        .filter_map(|o| benchmark.get(&o.date).map(|b| o.value - b))
        .collect()
}

/// Standard deviation of active returns.
pub fn tracking_error(series: &ReturnSeries, benchmark: &ReturnSeries) -> Option<f64> {
    sample_std(&active_returns(series, benchmark))
}

/// t-statistic of the mean active return.
pub fn t_statistic(series: &ReturnSeries, benchmark: &ReturnSeries) -> Option<f64> {
    let diffs = active_returns(series, benchmark);
    let std = sample_std(&diffs)?;
    if std <= 0.0 {
        return None;
    }
    let n = diffs.len() as f64;
    let mean = diffs.iter().sum::<f64>() / n;
    Some(mean / (std / n.sqrt()))
}

/// Equal-weighted return of every eligible security, per date.
pub fn universe_benchmark(data: &MarketData) -> ReturnSeries {
    let pairs = data.iter().filter_map(|section| {
        let returns: Vec<f64> = section.eligible().filter_map(|o| o.returns()).collect();
        if returns.is_empty() {
            return None;
        }
        Some((section.date, returns.iter().sum::<f64>() / returns.len() as f64))
    });
    // MarketData iterates in date order, so pushes never fail
    ReturnSeries::from_pairs(pairs).unwrap_or_default()
}

/// Statistics of one portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Portfolio label
    pub label: PortfolioLabel,
    /// Number of observed periods
    pub periods: usize,
    /// First observed date
    pub start: Option<NaiveDate>,
    /// Last observed date
    pub end: Option<NaiveDate>,
    /// Compounded return
    pub total_return: Option<f64>,
    /// Annualised compounded return
    pub annualized_return: Option<f64>,
    /// Per-period volatility
    pub volatility: Option<f64>,
    /// Annualised volatility
    pub annualized_volatility: Option<f64>,
    /// Per-period Sharpe ratio
    pub sharpe_ratio: Option<f64>,
    /// Maximum drawdown (non-positive)
    pub max_drawdown: Option<f64>,
    /// Historical value at risk
    pub value_at_risk: Option<f64>,
    /// Tracking error against the benchmark
    pub tracking_error: Option<f64>,
    /// t-statistic of the active return
    pub t_stat: Option<f64>,
}

/// Computes performance statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAnalyzer {
    config: PerformanceConfig,
}

impl PerformanceAnalyzer {
    /// Create an analyzer, validating the configuration.
    pub fn new(config: PerformanceConfig) -> Result<Self, PerformanceError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Analyzer configuration.
    pub const fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Statistics of one series.
    pub fn analyze(
        &self,
        label: PortfolioLabel,
        series: &ReturnSeries,
        benchmark: Option<&ReturnSeries>,
    ) -> PerformanceStats {
        let values = series.values();
        let total = total_return(&values);
        let volatility = sample_std(&values);

        PerformanceStats {
            label,
            periods: values.len(),
            start: series.observations().first().map(|o| o.date),
            end: series.observations().last().map(|o| o.date),
            total_return: total,
            annualized_return: total
                .and_then(|t| annualized_return(t, values.len(), self.config.periods_per_year)),
            volatility,
            annualized_volatility: volatility
                .map(|v| v * f64::from(self.config.periods_per_year).sqrt()),
            sharpe_ratio: series.sharpe_ratio(self.config.risk_free_rate),
            max_drawdown: max_drawdown(&values),
            value_at_risk: value_at_risk(&values, self.config.confidence_level),
            tracking_error: benchmark.and_then(|b| tracking_error(series, b)),
            t_stat: benchmark.and_then(|b| t_statistic(series, b)),
        }
    }

    /// Statistics of every portfolio.
    pub fn analyze_all(
        &self,
        returns: &PortfolioReturns,
        benchmark: Option<&ReturnSeries>,
    ) -> PerformanceReport {
        let stats: BTreeMap<_, _> = returns
            .iter()
            .map(|(label, series)| (*label, self.analyze(*label, series, benchmark)))
            .collect();
        debug!(portfolios = stats.len(), "computed performance statistics");
        PerformanceReport {
            config: self.config,
            stats,
        }
    }
}

/// Statistics of every portfolio of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Configuration the statistics were computed with
    pub config: PerformanceConfig,
    /// Statistics keyed by portfolio
    pub stats: BTreeMap<PortfolioLabel, PerformanceStats>,
}

impl PerformanceReport {
    /// Statistics of one portfolio.
    pub fn get(&self, label: &PortfolioLabel) -> Option<&PerformanceStats> {
        self.stats.get(label)
    }

    /// Number of portfolios.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether the report is empty.
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, PerformanceError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PerformanceError::Serialization(e.to_string()))
    }
}
