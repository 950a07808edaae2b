//! Weighting schemes
//!
//! A scheme turns each entry of a bucket into a raw score; scores are
//! normalised within each leg so that the long leg sums to +1 and the short
//! leg to -1. An empty leg contributes nothing. A missing score takes the
//! median of the leg's present scores. When a leg has a negative or
//! non-finite score, no score at all, or a zero total, the whole leg falls
//! back to equal weights.

pub mod dollar_volume;
pub mod equal;
pub mod inverse_volatility;
pub mod registry;
pub mod volume;

pub use dollar_volume::DollarVolumeWeight;
pub use equal::EqualWeight;
pub use inverse_volatility::InverseVolatilityWeight;
pub use registry::{SchemeInfo, SchemeRegistry, available_schemes, get_scheme_info};
pub use volume::VolumeWeight;

use chrono::NaiveDate;
use derive_more::Display;
use doublesort_data::SecurityObservation;
use doublesort_signals::{Bucket, BucketLabel, BucketSet, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Errors raised when selecting a weighting scheme
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WeightingError {
    /// The scheme name matches no known scheme
    #[error("Unknown weighting scheme: {0}")]
    UnknownScheme(String),
}

/// Available weighting schemes
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Same weight for every security of a leg
    #[display("equal")]
    Equal,
    /// Proportional to traded volume
    #[display("volume")]
    Volume,
    /// Proportional to the inverse of trailing volatility
    #[display("inverse_volatility")]
    InverseVolatility,
    /// Proportional to price times volume
    #[display("dollar_volume")]
    DollarVolume,
}

impl WeightingScheme {
    /// Every scheme, in enumeration order.
    pub const ALL: [Self; 4] = [
        Self::Equal,
        Self::Volume,
        Self::InverseVolatility,
        Self::DollarVolume,
    ];
}

impl FromStr for WeightingScheme {
    type Err = WeightingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        get_scheme_info(s)
            .map(|info| info.scheme)
            .ok_or_else(|| WeightingError::UnknownScheme(s.to_string()))
    }
}

/// A weighting formula.
pub trait Weighting: fmt::Debug + Send + Sync {
    /// Scheme implemented.
    fn scheme(&self) -> WeightingScheme;

    /// Raw, unnormalised score of one observation.
    fn score(&self, observation: &SecurityObservation) -> Option<f64>;

    /// Weight a bucket.
    fn apply(&self, bucket: &Bucket) -> WeightedBucket {
        let mut rows = Vec::with_capacity(bucket.len());
        for position in [Position::Long, Position::Short] {
            let leg: Vec<_> = bucket.leg(position).collect();
            let scores: Vec<_> = leg.iter().map(|e| self.score(&e.observation)).collect();
            let weights = normalize_leg(&scores, position).unwrap_or_else(|| {
                warn!(
                    date = %bucket.date,
                    bucket = %bucket.label,
                    scheme = %self.scheme(),
                    leg = %position,
                    "unusable scores, falling back to equal weights"
                );
                equal_leg(leg.len(), position)
            });

            rows.extend(leg.into_iter().zip(weights).map(|(entry, weight)| {
                WeightedEntry::new(entry.observation.clone(), entry.position, weight)
            }));
        }

        WeightedBucket {
            date: bucket.date,
            label: bucket.label,
            scheme: self.scheme(),
            rows,
        }
    }
}

/// Normalise a leg's scores to sum to the leg's sign.
///
/// Missing scores are imputed with the median of the present ones. Returns
/// `None` when a score is negative or non-finite, when every score is
/// missing, or when the total is not positive. An empty leg yields an empty
/// vector.
pub fn normalize_leg(scores: &[Option<f64>], position: Position) -> Option<Vec<f64>> {
    if scores.is_empty() {
        return Some(Vec::new());
    }

    let mut present: Vec<f64> = scores.iter().flatten().copied().collect();
    if present.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let fill = median(&mut present)?;

    let usable: Vec<f64> = scores.iter().map(|s| s.unwrap_or(fill)).collect();
    let total: f64 = usable.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }

    let sign = position.sign();
    Some(usable.into_iter().map(|s| sign * s / total).collect())
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn equal_leg(len: usize, position: Position) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    vec![position.sign() / len as f64; len]
}

/// A security with its normalised weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry {
    /// Source observation.
    pub observation: SecurityObservation,
    /// Side of the position.
    pub position: Position,
    /// Signed weight.
    pub weight: f64,
    /// Period return times weight.
    pub weighted_return: f64,
}

impl WeightedEntry {
    /// Create an entry, deriving the weighted return.
    pub fn new(observation: SecurityObservation, position: Position, weight: f64) -> Self {
        let weighted_return = observation.returns().unwrap_or(0.0) * weight;
        Self {
            observation,
            position,
            weight,
            weighted_return,
        }
    }

    /// Symbol of the entry.
    pub fn symbol(&self) -> &str {
        &self.observation.symbol
    }
}

/// A bucket after weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedBucket {
    /// Rebalancing date.
    pub date: NaiveDate,
    /// Bucket label.
    pub label: BucketLabel,
    /// Scheme the weights were computed with.
    pub scheme: WeightingScheme,
    /// Weighted entries, long leg first.
    pub rows: Vec<WeightedEntry>,
}

impl WeightedBucket {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the bucket holds nothing.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of weights of one leg.
    pub fn leg_weight(&self, position: Position) -> f64 {
        self.rows
            .iter()
            .filter(|r| r.position == position)
            .map(|r| r.weight)
            .sum()
    }

    /// Sum of weighted returns.
    pub fn total_return(&self) -> f64 {
        self.rows.iter().map(|r| r.weighted_return).sum()
    }

    /// Rows of a symbol (one per side it is held on).
    pub fn rows_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a WeightedEntry> {
        self.rows.iter().filter(move |r| r.symbol() == symbol)
    }
}

/// Weighted return and volume buckets of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedBucketSet {
    /// Rebalancing date.
    pub date: NaiveDate,
    /// Scheme used on both axes.
    pub scheme: WeightingScheme,
    /// Weighted return buckets.
    pub returns: BTreeMap<BucketLabel, WeightedBucket>,
    /// Weighted volume buckets.
    pub volume: BTreeMap<BucketLabel, WeightedBucket>,
}

/// Weight every bucket of a date with one scheme.
pub fn weight_set(set: &BucketSet, weighting: &dyn Weighting) -> WeightedBucketSet {
    let weigh = |buckets: &BTreeMap<BucketLabel, Bucket>| {
        buckets
            .iter()
            .map(|(label, bucket)| (*label, weighting.apply(bucket)))
            .collect()
    };

    WeightedBucketSet {
        date: set.date,
        scheme: weighting.scheme(),
        returns: weigh(&set.returns),
        volume: weigh(&set.volume),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("equal", WeightingScheme::Equal)]
    #[case("equi", WeightingScheme::Equal)]
    #[case("volume", WeightingScheme::Volume)]
    #[case("inverse_volatility", WeightingScheme::InverseVolatility)]
    #[case("vol", WeightingScheme::InverseVolatility)]
    #[case("dollar_volume", WeightingScheme::DollarVolume)]
    #[case("volumexprice", WeightingScheme::DollarVolume)]
    fn test_scheme_from_str(#[case] name: &str, #[case] expected: WeightingScheme) {
        assert_eq!(name.parse::<WeightingScheme>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let err = "markowitz".parse::<WeightingScheme>().unwrap_err();
        assert_eq!(err, WeightingError::UnknownScheme("markowitz".to_string()));
    }

    #[test]
    fn test_scheme_display_round_trips() {
        for scheme in WeightingScheme::ALL {
            assert_eq!(scheme.to_string().parse::<WeightingScheme>().unwrap(), scheme);
        }
    }

    #[test]
    fn test_scheme_serde_names() {
        let json = serde_json::to_string(&WeightingScheme::InverseVolatility).unwrap();
        assert_eq!(json, "\"inverse_volatility\"");
    }

    #[test]
    fn test_normalize_leg() {
        let weights = normalize_leg(&[Some(1.0), Some(3.0)], Position::Long).unwrap();
        assert_relative_eq!(weights[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(weights[1], 0.75, epsilon = 1e-12);

        let weights = normalize_leg(&[Some(1.0), Some(3.0)], Position::Short).unwrap();
        assert_relative_eq!(weights[0], -0.25, epsilon = 1e-12);
        assert_relative_eq!(weights[1], -0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_leg_imputes_median() {
        // Present scores 1 and 4 have median 2.5
        let weights = normalize_leg(&[Some(1.0), None, Some(4.0)], Position::Long).unwrap();
        assert_relative_eq!(weights[0], 1.0 / 7.5, epsilon = 1e-12);
        assert_relative_eq!(weights[1], 2.5 / 7.5, epsilon = 1e-12);
        assert_relative_eq!(weights[2], 4.0 / 7.5, epsilon = 1e-12);
    }

    #[rstest]
    #[case(vec![Some(0.0), Some(0.0)])]
    #[case(vec![None, None])]
    #[case(vec![Some(-1.0), Some(2.0)])]
    #[case(vec![Some(f64::INFINITY)])]
    fn test_normalize_leg_unusable(#[case] scores: Vec<Option<f64>>) {
        assert!(normalize_leg(&scores, Position::Long).is_none());
    }

    #[test]
    fn test_normalize_empty_leg() {
        assert_eq!(normalize_leg(&[], Position::Short), Some(Vec::new()));
    }
}
