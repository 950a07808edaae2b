//! Intersection portfolios
//!
//! Crosses every weighted return bucket with every weighted volume bucket of
//! a date. A security held in both buckets on the same side receives the sum
//! of both weights: each axis contributes its own unit of conviction, so the
//! two signals add rather than average.
//!
//! A security can sit on opposite sides of the two buckets (e.g. short in
//! `R5-R1`, long in `V2`). What happens to those rows is governed by
//! [`ConflictPolicy`].

use crate::weighting::{WeightedBucket, WeightedBucketSet, WeightedEntry};
use chrono::NaiveDate;
use derive_more::Display;
use doublesort_signals::{Axis, BucketLabel, ParseLabelError, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while intersecting one date
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntersectionError {
    /// The date has no weighted buckets on one axis
    #[error("No weighted {axis} buckets for {date}")]
    MissingBuckets {
        /// Date being intersected
        date: NaiveDate,
        /// Axis with no buckets
        axis: Axis,
    },

    /// The two sides were weighted on different dates
    #[error("Date mismatch: returns bucket {returns}, volume bucket {volume}")]
    DateMismatch {
        /// Date of the return bucket
        returns: NaiveDate,
        /// Date of the volume bucket
        volume: NaiveDate,
    },
}

/// Treatment of a security held long on one axis and short on the other
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Retain one row per side, each with its own weight
    #[default]
    #[display("keep_both")]
    KeepBoth,
    /// Collapse every row of the symbol into one row carrying the net weight
    #[display("net")]
    Net,
    /// Drop the conflicting rows
    #[display("exclude")]
    Exclude,
}

/// Origin of an intersection row
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowSource {
    /// Same side in both buckets, weights summed
    Both,
    /// Conflicting row kept from the return bucket
    ReturnsOnly,
    /// Conflicting row kept from the volume bucket
    VolumeOnly,
    /// Conflicting rows netted into one
    Netted,
}

/// Label of an intersection portfolio, displayed `R{i}_V{j}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortfolioLabel {
    /// Return bucket label
    pub returns: BucketLabel,
    /// Volume bucket label
    pub volume: BucketLabel,
}

impl PortfolioLabel {
    /// Create a label from its two bucket labels.
    pub const fn new(returns: BucketLabel, volume: BucketLabel) -> Self {
        Self { returns, volume }
    }
}

impl fmt::Display for PortfolioLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.returns, self.volume)
    }
}

impl FromStr for PortfolioLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (returns, volume) = s
            .split_once('_')
            .ok_or_else(|| ParseLabelError(s.to_string()))?;
        let returns: BucketLabel = returns.parse()?;
        let volume: BucketLabel = volume.parse()?;
        if returns.axis() != Axis::Returns || volume.axis() != Axis::Volume {
            return Err(ParseLabelError(s.to_string()));
        }
        Ok(Self { returns, volume })
    }
}

impl TryFrom<String> for PortfolioLabel {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortfolioLabel> for String {
    fn from(label: PortfolioLabel) -> Self {
        label.to_string()
    }
}

/// One row of an intersection portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionRow {
    /// Security identifier
    pub symbol: String,
    /// Side of the position
    pub position: Position,
    /// Combined signed weight
    pub weight: f64,
    /// Combined weighted return
    pub weighted_return: f64,
    /// Period return of the security
    pub returns: f64,
    /// Trailing volatility of the security, if known
    pub volatility: Option<f64>,
    /// Where the row came from
    pub source: RowSource,
}

impl IntersectionRow {
    fn merged(r: &WeightedEntry, v: &WeightedEntry) -> Self {
        Self {
            symbol: r.symbol().to_string(),
            position: r.position,
            weight: r.weight + v.weight,
            weighted_return: r.weighted_return + v.weighted_return,
            returns: r.observation.returns().unwrap_or(0.0),
            volatility: r.observation.volatility(),
            source: RowSource::Both,
        }
    }

    fn single(entry: &WeightedEntry, source: RowSource) -> Self {
        Self {
            symbol: entry.symbol().to_string(),
            position: entry.position,
            weight: entry.weight,
            weighted_return: entry.weighted_return,
            returns: entry.observation.returns().unwrap_or(0.0),
            volatility: entry.observation.volatility(),
            source,
        }
    }

    fn netted(entries: &[&WeightedEntry]) -> Option<Self> {
        let first = entries.first()?;
        let weight: f64 = entries.iter().map(|e| e.weight).sum();
        let weighted_return: f64 = entries.iter().map(|e| e.weighted_return).sum();
        Some(Self {
            symbol: first.symbol().to_string(),
            position: if weight >= 0.0 {
                Position::Long
            } else {
                Position::Short
            },
            weight,
            weighted_return,
            returns: first.observation.returns().unwrap_or(0.0),
            volatility: first.observation.volatility(),
            source: RowSource::Netted,
        })
    }
}

/// Securities shared by one return bucket and one volume bucket on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionPortfolio {
    /// Rebalancing date
    pub date: NaiveDate,
    /// Portfolio label
    pub label: PortfolioLabel,
    /// Rows in return-bucket order
    pub rows: Vec<IntersectionRow>,
}

impl IntersectionPortfolio {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the intersection is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of weighted returns.
    pub fn total_return(&self) -> f64 {
        self.rows.iter().map(|r| r.weighted_return).sum()
    }

    /// Sum of weights.
    pub fn total_weight(&self) -> f64 {
        self.rows.iter().map(|r| r.weight).sum()
    }

    /// Whether a symbol has at least one row.
    pub fn contains(&self, symbol: &str) -> bool {
        self.rows.iter().any(|r| r.symbol == symbol)
    }
}

/// All intersection portfolios of one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedIntersections {
    /// Rebalancing date
    pub date: NaiveDate,
    /// Portfolios keyed by label
    pub portfolios: BTreeMap<PortfolioLabel, IntersectionPortfolio>,
}

/// Flat holding record, one per intersection row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    /// Rebalancing date
    pub date: NaiveDate,
    /// Security identifier
    pub symbol: String,
    /// Signed weight
    pub weight: f64,
    /// Portfolio label
    pub portfolio: PortfolioLabel,
}

/// Intersection portfolios of every processed date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntersectionGrid {
    dates: BTreeMap<NaiveDate, BTreeMap<PortfolioLabel, IntersectionPortfolio>>,
}

impl IntersectionGrid {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one date's portfolios, replacing any previous ones for that date.
    pub fn insert(&mut self, dated: DatedIntersections) {
        self.dates.insert(dated.date, dated.portfolios);
    }

    /// Portfolios of a date.
    pub fn date(
        &self,
        date: &NaiveDate,
    ) -> Option<&BTreeMap<PortfolioLabel, IntersectionPortfolio>> {
        self.dates.get(date)
    }

    /// One portfolio.
    pub fn get(&self, date: &NaiveDate, label: &PortfolioLabel) -> Option<&IntersectionPortfolio> {
        self.dates.get(date)?.get(label)
    }

    /// Dates with their portfolios, in date order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&NaiveDate, &BTreeMap<PortfolioLabel, IntersectionPortfolio>)> {
        self.dates.iter()
    }

    /// Processed dates in order.
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.keys()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no date was processed.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Flatten into `(date, symbol, weight, portfolio)` records.
    pub fn holdings(&self) -> Vec<HoldingRecord> {
        self.dates
            .iter()
            .flat_map(|(date, portfolios)| {
                portfolios.values().flat_map(move |portfolio| {
                    portfolio.rows.iter().map(move |row| HoldingRecord {
                        date: *date,
                        symbol: row.symbol.clone(),
                        weight: row.weight,
                        portfolio: portfolio.label,
                    })
                })
            })
            .collect()
    }
}

/// Builds intersection portfolios from weighted buckets
#[derive(Debug, Clone, Copy, Default)]
pub struct Intersector {
    policy: ConflictPolicy,
}

impl Intersector {
    /// Create an intersector with a conflict policy.
    pub const fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Conflict policy in use.
    pub const fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Intersect every return bucket with every volume bucket of a date.
    ///
    /// # Arguments
    ///
    /// * `set` - Weighted return and volume buckets of one date
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use doublesort_data::{CrossSection, SecurityObservation};
    /// use doublesort_portfolio::weighting::EqualWeight;
    /// use doublesort_portfolio::{ConflictPolicy, Intersector, PortfolioLabel, weight_set};
    /// use doublesort_signals::{BucketSorter, SorterConfig};
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
    /// let config = SorterConfig { return_buckets: 2, volume_buckets: 1 };
    /// let buckets = BucketSorter::new(config).unwrap().sort(&section);
    /// let weighted = weight_set(&buckets, &EqualWeight);
    ///
    /// let dated = Intersector::new(ConflictPolicy::KeepBoth)
    ///     .intersect(&weighted)
    ///     .unwrap();
    /// // (2 + 1) return buckets times (1 + 1) volume buckets
    /// assert_eq!(dated.portfolios.len(), 6);
    ///
    /// // A and C: 1/2 from R2 plus 1/4 from V1
    /// let r2_v1 = &dated.portfolios[&"R2_V1".parse::<PortfolioLabel>().unwrap()];
    /// assert_eq!(r2_v1.len(), 2);
    /// assert!((r2_v1.total_weight() - 1.5).abs() < 1e-12);
    /// ```
    pub fn intersect(
        &self,
        set: &WeightedBucketSet,
    ) -> Result<DatedIntersections, IntersectionError> {
        if set.returns.is_empty() {
            return Err(IntersectionError::MissingBuckets {
                date: set.date,
                axis: Axis::Returns,
            });
        }
        if set.volume.is_empty() {
            return Err(IntersectionError::MissingBuckets {
                date: set.date,
                axis: Axis::Volume,
            });
        }

        let mut portfolios = BTreeMap::new();
        for returns in set.returns.values() {
            for volume in set.volume.values() {
                let portfolio = self.intersect_pair(returns, volume)?;
                portfolios.insert(portfolio.label, portfolio);
            }
        }

        debug!(date = %set.date, portfolios = portfolios.len(), "intersected buckets");
        Ok(DatedIntersections {
            date: set.date,
            portfolios,
        })
    }

    /// Intersect many dates; dates that fail are logged and skipped.
    pub fn intersect_all<'a>(
        &self,
        sets: impl IntoIterator<Item = &'a WeightedBucketSet>,
    ) -> IntersectionGrid {
        let mut grid = IntersectionGrid::new();
        for set in sets {
            match self.intersect(set) {
                Ok(dated) => grid.insert(dated),
                Err(e) => warn!(date = %set.date, error = %e, "skipping date"),
            }
        }
        grid
    }

    /// Intersect one return bucket with one volume bucket.
    pub fn intersect_pair(
        &self,
        returns: &WeightedBucket,
        volume: &WeightedBucket,
    ) -> Result<IntersectionPortfolio, IntersectionError> {
        if returns.date != volume.date {
            return Err(IntersectionError::DateMismatch {
                returns: returns.date,
                volume: volume.date,
            });
        }

        let mut volume_rows: HashMap<&str, Vec<&WeightedEntry>> = HashMap::new();
        for row in &volume.rows {
            volume_rows.entry(row.symbol()).or_default().push(row);
        }

        let mut return_rows: Vec<(&str, Vec<&WeightedEntry>)> = Vec::new();
        let mut return_index: HashMap<&str, usize> = HashMap::new();
        for row in &returns.rows {
            match return_index.get(row.symbol()) {
                Some(&i) => return_rows[i].1.push(row),
                None => {
                    return_index.insert(row.symbol(), return_rows.len());
                    return_rows.push((row.symbol(), vec![row]));
                }
            }
        }

        let label = PortfolioLabel::new(returns.label, volume.label);
        let mut rows = Vec::new();
        let mut conflicts = 0usize;

        for (symbol, r_rows) in &return_rows {
            let Some(v_rows) = volume_rows.get(symbol) else {
                continue;
            };

            let mut merged = Vec::new();
            let mut unmatched: Vec<(&WeightedEntry, RowSource)> = Vec::new();
            for r in r_rows {
                match v_rows.iter().find(|v| v.position == r.position) {
                    Some(v) => merged.push(IntersectionRow::merged(r, v)),
                    None => unmatched.push((*r, RowSource::ReturnsOnly)),
                }
            }
            for v in v_rows {
                if !r_rows.iter().any(|r| r.position == v.position) {
                    unmatched.push((*v, RowSource::VolumeOnly));
                }
            }

            if unmatched.is_empty() {
                rows.extend(merged);
                continue;
            }
            conflicts += 1;

            match self.policy {
                ConflictPolicy::KeepBoth => {
                    rows.extend(merged);
                    rows.extend(
                        unmatched
                            .iter()
                            .map(|(entry, source)| IntersectionRow::single(entry, *source)),
                    );
                }
                // Every row of the symbol, from both buckets, collapses into one
                ConflictPolicy::Net => {
                    let entries: Vec<&WeightedEntry> =
                        r_rows.iter().chain(v_rows.iter()).copied().collect();
                    rows.extend(IntersectionRow::netted(&entries));
                }
                ConflictPolicy::Exclude => rows.extend(merged),
            }
        }

        if conflicts > 0 {
            debug!(
                date = %returns.date,
                portfolio = %label,
                conflicts,
                policy = %self.policy,
                "position conflicts in intersection"
            );
        }

        Ok(IntersectionPortfolio {
            date: returns.date,
            label,
            rows,
        })
    }
}
