//! Security observations.
//!
//! One row per security per rebalancing date. Numeric fields are optional
//! because vendor panels routinely have holes; non-finite values are treated
//! the same as missing ones.

use serde::{Deserialize, Serialize};

/// A single security observed on one rebalancing date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityObservation {
    /// Security identifier, unique within a date.
    pub symbol: String,
    /// Last price.
    pub price: Option<f64>,
    /// Traded volume over the period.
    pub volume: Option<f64>,
    /// Period return.
    pub returns: Option<f64>,
    /// Trailing volatility of returns.
    pub volatility: Option<f64>,
    /// Risk-free rate attached to the observation.
    pub risk_free_rate: Option<f64>,
}

impl SecurityObservation {
    /// Create an observation with price, volume and return populated.
    pub fn new(symbol: impl Into<String>, price: f64, volume: f64, returns: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price: Some(price),
            volume: Some(volume),
            returns: Some(returns),
            volatility: None,
            risk_free_rate: None,
        }
    }

    /// Set the trailing volatility.
    pub const fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    /// Set the risk-free rate.
    pub const fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }

    /// Price, if present and finite.
    pub fn price(&self) -> Option<f64> {
        finite(self.price)
    }

    /// Volume, if present and finite.
    pub fn volume(&self) -> Option<f64> {
        finite(self.volume)
    }

    /// Period return, if present and finite.
    pub fn returns(&self) -> Option<f64> {
        finite(self.returns)
    }

    /// Volatility, if present, finite and strictly positive.
    pub fn volatility(&self) -> Option<f64> {
        finite(self.volatility).filter(|v| *v > 0.0)
    }

    /// Dollar volume (price times volume).
    pub fn dollar_volume(&self) -> Option<f64> {
        Some(self.price()? * self.volume()?)
    }

    /// Whether the observation can be ranked: price, volume and return are
    /// all present.
    pub fn is_eligible(&self) -> bool {
        self.price().is_some() && self.volume().is_some() && self.returns().is_some()
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
