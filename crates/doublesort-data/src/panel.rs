//! Panel preparation
//!
//! Turns a long price/volume panel into the per-date table the pipeline
//! consumes: snaps to the rebalancing frequency, computes period returns
//! between consecutive rebalancing dates and the trailing volatility of
//! those returns. A symbol without a usable volatility on a date takes the
//! cross-sectional median of that date.
//!
//! Input columns: `date`, `symbol`, `price`, `volume`.
//! Output columns: `date`, `symbol`, `price`, `volume`, `returns`,
//! `volatility`, `risk_free_rate`.

use crate::cross_section::MarketData;
use crate::error::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for panel preparation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Keep every k-th distinct date (default: 1, every date)
    pub rebalance_every: usize,
    /// Trailing window for volatility, in rebalancing periods (default: 3)
    pub volatility_window: usize,
    /// Minimum observations inside the window (default: 2)
    pub min_periods: usize,
    /// Constant risk-free rate attached to every row (default: 0.0)
    pub risk_free_rate: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rebalance_every: 1,
            volatility_window: 3,
            min_periods: 2,
            risk_free_rate: 0.0,
        }
    }
}

impl PanelConfig {
    fn validate(&self) -> Result<()> {
        if self.rebalance_every == 0 {
            return Err(DataError::InvalidParameter(
                "rebalance_every must be at least 1".to_string(),
            ));
        }
        if self.volatility_window < 2 {
            return Err(DataError::InvalidParameter(format!(
                "volatility_window must be at least 2, got {}",
                self.volatility_window
            )));
        }
        if self.min_periods == 0 || self.min_periods > self.volatility_window {
            return Err(DataError::InvalidParameter(format!(
                "min_periods must be in 1..={}, got {}",
                self.volatility_window, self.min_periods
            )));
        }
        Ok(())
    }
}

/// Prepare a raw price/volume panel.
///
/// The first rebalancing date of each symbol has a null return and is
/// therefore ineligible for ranking downstream. Missing or non-positive
/// volatilities are replaced by the median volatility of the same date;
/// they stay null only when no symbol on that date has one.
pub fn prepare_panel(raw: LazyFrame, config: &PanelConfig) -> Result<LazyFrame> {
    config.validate()?;

    let every = config.rebalance_every as i64;

    let prepared = raw
        // 1. Snap to the rebalancing frequency using the dense date rank
        .with_columns([col("date")
            .rank(
                RankOptions {
                    method: RankMethod::Dense,
                    descending: false,
                },
                None,
            )
            .cast(DataType::Int64)
            .alias("date_rank")])
        .filter(((col("date_rank") - lit(1i64)) % lit(every)).eq(lit(0i64)))
        .sort(["symbol", "date"], Default::default())
        // 2. Period return between consecutive rebalancing dates
        .with_columns([
            (col("price") / col("price").shift(lit(1)).over([col("symbol")]) - lit(1.0))
                .alias("returns"),
        ])
        // 3. Trailing volatility of period returns
        .with_columns([col("returns")
            .rolling_std(RollingOptionsFixedWindow {
                window_size: config.volatility_window,
                min_periods: config.min_periods,
                ..Default::default()
            })
            .over([col("symbol")])
            .alias("volatility")])
        .with_columns([
            when(col("volatility").gt(lit(0.0)))
                .then(col("volatility"))
                .otherwise(lit(NULL))
                .cast(DataType::Float64)
                .alias("volatility"),
            lit(config.risk_free_rate).alias("risk_free_rate"),
        ])
        // 4. Fill gaps with the cross-sectional median
        .with_columns([col("volatility")
            .fill_null(col("volatility").median().over([col("date")]))
            .alias("volatility")])
        .select([
            col("date"),
            col("symbol"),
            col("price"),
            col("volume"),
            col("returns"),
            col("volatility"),
            col("risk_free_rate"),
        ]);

    Ok(prepared)
}

/// Prepare a raw panel and split it into per-date cross-sections.
pub fn prepare_market_data(raw: LazyFrame, config: &PanelConfig) -> Result<MarketData> {
    let frame = prepare_panel(raw, config)?.collect()?;
    MarketData::from_frame(&frame)
}
