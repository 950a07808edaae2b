//! Per-date cross-sections and the date-ordered market data map.

use crate::error::{DataError, Result};
use crate::observation::SecurityObservation;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use tracing::{debug, warn};

/// All securities observed on one rebalancing date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    /// Rebalancing date.
    pub date: NaiveDate,
    /// Observations, one per symbol.
    pub observations: Vec<SecurityObservation>,
}

impl CrossSection {
    /// Create a cross-section.
    pub const fn new(date: NaiveDate, observations: Vec<SecurityObservation>) -> Self {
        Self { date, observations }
    }

    /// Number of observations, eligible or not.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the cross-section has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations with price, volume and return all present.
    pub fn eligible(&self) -> impl Iterator<Item = &SecurityObservation> {
        self.observations.iter().filter(|o| o.is_eligible())
    }

    /// Look up an observation by symbol.
    pub fn get(&self, symbol: &str) -> Option<&SecurityObservation> {
        self.observations.iter().find(|o| o.symbol == symbol)
    }
}

/// Date-ordered map of cross-sections.
///
/// Dates iterate in increasing order, which is the order the pipeline
/// processes and aggregates them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    sections: BTreeMap<NaiveDate, CrossSection>,
}

impl MarketData {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cross-section, replacing any existing one for that date.
    pub fn insert(&mut self, section: CrossSection) -> Option<CrossSection> {
        self.sections.insert(section.date, section)
    }

    /// Cross-section for a date.
    pub fn get(&self, date: &NaiveDate) -> Option<&CrossSection> {
        self.sections.get(date)
    }

    /// Rebalancing dates in increasing order.
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.sections.keys()
    }

    /// Cross-sections in date order.
    pub fn iter(&self) -> btree_map::Values<'_, NaiveDate, CrossSection> {
        self.sections.values()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether there are no dates.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Build from a long-format frame.
    ///
    /// Required columns: `date`, `symbol`, `price`, `volume`, `returns`.
    /// Optional columns: `volatility`, `risk_free_rate`. The date column may
    /// be `Date`, `Datetime` or `%Y-%m-%d` strings. Numeric columns are
    /// cast to `Float64`; nulls become missing fields. A symbol repeated on
    /// the same date keeps its last row.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let symbols = required(df, "symbol")?;
        let symbols = symbols.str()?;
        let dates = date_column(required(df, "date")?)?;
        let prices = float_column(required(df, "price")?)?;
        let volumes = float_column(required(df, "volume")?)?;
        let returns = float_column(required(df, "returns")?)?;
        let volatilities = optional_float_column(df, "volatility")?;
        let risk_free_rates = optional_float_column(df, "risk_free_rate")?;

        let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, SecurityObservation>> =
            BTreeMap::new();

        for i in 0..df.height() {
            let symbol = symbols
                .get(i)
                .ok_or_else(|| DataError::Parse(format!("Missing symbol at row {}", i)))?;
            let date = dates
                .get(i)
                .copied()
                .flatten()
                .ok_or_else(|| DataError::Parse(format!("Missing date at row {}", i)))?;

            let observation = SecurityObservation {
                symbol: symbol.to_string(),
                price: prices.get(i),
                volume: volumes.get(i),
                returns: returns.get(i),
                volatility: volatilities.as_ref().and_then(|c| c.get(i)),
                risk_free_rate: risk_free_rates.as_ref().and_then(|c| c.get(i)),
            };

            let rows = by_date.entry(date).or_default();
            if rows.insert(symbol.to_string(), observation).is_some() {
                warn!(%date, symbol, "duplicate symbol in cross-section, keeping last row");
            }
        }

        let data: Self = by_date
            .into_iter()
            .map(|(date, rows)| CrossSection::new(date, rows.into_values().collect()))
            .collect();

        debug!(dates = data.len(), rows = df.height(), "built market data from frame");
        Ok(data)
    }
}

impl FromIterator<CrossSection> for MarketData {
    fn from_iter<I: IntoIterator<Item = CrossSection>>(iter: I) -> Self {
        let mut data = Self::new();
        for section in iter {
            data.insert(section);
        }
        data
    }
}

impl<'a> IntoIterator for &'a MarketData {
    type Item = &'a CrossSection;
    type IntoIter = btree_map::Values<'a, NaiveDate, CrossSection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))
}

/// Days between 0001-01-01 and the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_column(column: &Column) -> Result<Vec<Option<NaiveDate>>> {
    if column.dtype() == &DataType::String {
        return column
            .str()?
            .into_iter()
            .map(|raw| {
                raw.map(|raw| {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .map_err(|e| DataError::Parse(format!("Invalid date '{}': {}", raw, e)))
                })
                .transpose()
            })
            .collect();
    }

    let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
    days.i32()?
        .into_iter()
        .map(|days| {
            days.map(|days| {
                days.checked_add(EPOCH_DAYS_FROM_CE)
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
                    .ok_or_else(|| DataError::Parse(format!("Date out of range: {} days", days)))
            })
            .transpose()
        })
        .collect()
}

fn float_column(column: &Column) -> Result<Float64Chunked> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.clone())
}

fn optional_float_column(df: &DataFrame, name: &str) -> Result<Option<Float64Chunked>> {
    match df.column(name) {
        Ok(column) => Ok(Some(float_column(column)?)),
        Err(_) => Ok(None),
    }
}
