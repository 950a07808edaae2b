//! Return series
//!
//! Append-only per-portfolio series of period returns, with the handful of
//! statistics the best-method search needs. Richer performance metrics live
//! in `doublesort-output`.

use crate::intersection::PortfolioLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use thiserror::Error;

/// Errors raised when extending a series
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// Observations must be appended in strictly increasing date order
    #[error("Non-increasing date {date} (last observation {last})")]
    NonIncreasingDate {
        /// Date being appended
        date: NaiveDate,
        /// Date of the last observation
        last: NaiveDate,
    },
}

/// One period of a portfolio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    /// Rebalancing date
    pub date: NaiveDate,
    /// Period return
    pub value: f64,
    /// Period volatility estimate, if every holding had one
    pub volatility: Option<f64>,
}

/// Date-ordered period returns of one portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    observations: Vec<ReturnObservation>,
}

impl ReturnSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(date, value)` pairs.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let mut series = Self::new();
        for (date, value) in pairs {
            series.push(ReturnObservation {
                date,
                value,
                volatility: None,
            })?;
        }
        Ok(series)
    }

    /// Append an observation dated after the last one.
    pub fn push(&mut self, observation: ReturnObservation) -> Result<(), SeriesError> {
        if let Some(last) = self.observations.last() {
            if observation.date <= last.date {
                return Err(SeriesError::NonIncreasingDate {
                    date: observation.date,
                    last: last.date,
                });
            }
        }
        self.observations.push(observation);
        Ok(())
    }

    /// Observations in date order.
    pub fn observations(&self) -> &[ReturnObservation] {
        &self.observations
    }

    /// Period returns in date order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Dates in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    /// Return on a date.
    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by(|o| o.date.cmp(date))
            .ok()
            .map(|i| self.observations[i].value)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Arithmetic mean of the returns.
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.observations.iter().map(|o| o.value).sum::<f64>() / self.len() as f64)
    }

    /// Sample standard deviation of the returns, `None` below two observations.
    pub fn std(&self) -> Option<f64> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .observations
            .iter()
            .map(|o| (o.value - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some(variance.sqrt())
    }

    /// Per-period Sharpe ratio `(mean - rf) / std`.
    ///
    /// `None` when the deviation is undefined or zero.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> Option<f64> {
        let std = self.std()?;
        if std <= f64::EPSILON {
            return None;
        }
        let sharpe = (self.mean()? - risk_free_rate) / std;
        sharpe.is_finite().then_some(sharpe)
    }

    /// Compounded wealth curve minus one, one value per observation.
    pub fn cumulative(&self) -> Vec<f64> {
        self.observations
            .iter()
            .scan(1.0, |wealth, o| {
                *wealth *= 1.0 + o.value;
                Some(*wealth - 1.0)
            })
            .collect()
    }
}

/// Return series of every intersection portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReturns {
    series: BTreeMap<PortfolioLabel, ReturnSeries>,
}

impl PortfolioReturns {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one date's returns, keyed by portfolio.
    pub fn merge_period(
        &mut self,
        period: impl IntoIterator<Item = (PortfolioLabel, ReturnObservation)>,
    ) -> Result<(), SeriesError> {
        for (label, observation) in period {
            self.series.entry(label).or_default().push(observation)?;
        }
        Ok(())
    }

    /// Series of a portfolio.
    pub fn get(&self, label: &PortfolioLabel) -> Option<&ReturnSeries> {
        self.series.get(label)
    }

    /// Portfolios with their series, in label order.
    pub fn iter(&self) -> btree_map::Iter<'_, PortfolioLabel, ReturnSeries> {
        self.series.iter()
    }

    /// Observed portfolio labels.
    pub fn labels(&self) -> impl Iterator<Item = &PortfolioLabel> {
        self.series.keys()
    }

    /// Number of portfolios with at least one observation.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether no portfolio was observed.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl<'a> IntoIterator for &'a PortfolioReturns {
    type Item = (&'a PortfolioLabel, &'a ReturnSeries);
    type IntoIter = btree_map::Iter<'a, PortfolioLabel, ReturnSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}
