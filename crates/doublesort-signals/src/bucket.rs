//! Buckets and their labels.

use chrono::NaiveDate;
use derive_more::Display;
use doublesort_data::SecurityObservation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Side of a position.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Long position, weights sum to +1.
    #[display("LONG")]
    Long,
    /// Short position, weights sum to -1.
    #[display("SHORT")]
    Short,
}

impl Position {
    /// Sign applied to weights of this leg.
    pub const fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    /// The opposite side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Signal a bucket was ranked on.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Ranked by period return.
    #[display("R")]
    Returns,
    /// Ranked by traded volume.
    #[display("V")]
    Volume,
}

impl Axis {
    const fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'R' => Some(Self::Returns),
            'V' => Some(Self::Volume),
            _ => None,
        }
    }
}

/// Label of a bucket.
///
/// Rank buckets order by index; the spread bucket sorts after every rank
/// bucket of its axis. Serialized as its display string.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BucketLabel {
    /// Quantile bucket, `index` 1 is the lowest ranked slice.
    #[display("{axis}{index}")]
    Rank {
        /// Ranking signal.
        axis: Axis,
        /// 1-based quantile index.
        index: usize,
    },
    /// Long the top bucket, short the bottom bucket.
    #[display("{axis}{top}-{axis}1")]
    Spread {
        /// Ranking signal.
        axis: Axis,
        /// Index of the long (top) bucket.
        top: usize,
    },
}

impl BucketLabel {
    /// Rank label on the returns axis.
    pub const fn returns(index: usize) -> Self {
        Self::Rank {
            axis: Axis::Returns,
            index,
        }
    }

    /// Rank label on the volume axis.
    pub const fn volume(index: usize) -> Self {
        Self::Rank {
            axis: Axis::Volume,
            index,
        }
    }

    /// Spread label for an axis with `top` buckets.
    pub const fn spread(axis: Axis, top: usize) -> Self {
        Self::Spread { axis, top }
    }

    /// Axis of the label.
    pub const fn axis(&self) -> Axis {
        match self {
            Self::Rank { axis, .. } | Self::Spread { axis, .. } => *axis,
        }
    }

    /// Whether this is a spread label.
    pub const fn is_spread(&self) -> bool {
        matches!(self, Self::Spread { .. })
    }
}

/// Error parsing a bucket label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid bucket label: {0}")]
pub struct ParseLabelError(pub String);

impl FromStr for BucketLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseLabelError(s.to_string());
        let mut chars = s.chars();
        let axis = chars
            .next()
            .and_then(Axis::from_prefix)
            .ok_or_else(invalid)?;
        let rest = chars.as_str();

        match rest.split_once('-') {
            None => {
                let index: usize = rest.parse().map_err(|_| invalid())?;
                if index == 0 {
                    return Err(invalid());
                }
                Ok(Self::Rank { axis, index })
            }
            Some((top, bottom)) => {
                let top: usize = top.parse().map_err(|_| invalid())?;
                if top == 0 || bottom != format!("{}1", axis) {
                    return Err(invalid());
                }
                Ok(Self::Spread { axis, top })
            }
        }
    }
}

impl TryFrom<String> for BucketLabel {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BucketLabel> for String {
    fn from(label: BucketLabel) -> Self {
        label.to_string()
    }
}

/// A security held in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// The observation the entry was built from.
    pub observation: SecurityObservation,
    /// Side of the position.
    pub position: Position,
}

impl BucketEntry {
    /// Symbol of the entry.
    pub fn symbol(&self) -> &str {
        &self.observation.symbol
    }
}

/// Ordered subset of a date's securities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Rebalancing date.
    pub date: NaiveDate,
    /// Bucket label.
    pub label: BucketLabel,
    /// Entries in rank order (spread buckets: long leg first).
    pub entries: Vec<BucketEntry>,
}

impl Bucket {
    /// Create an empty bucket.
    pub const fn empty(date: NaiveDate, label: BucketLabel) -> Self {
        Self {
            date,
            label,
            entries: Vec::new(),
        }
    }

    /// Bucket holding `observations` on one side.
    pub fn from_observations(
        date: NaiveDate,
        label: BucketLabel,
        observations: impl IntoIterator<Item = SecurityObservation>,
        position: Position,
    ) -> Self {
        let entries = observations
            .into_iter()
            .map(|observation| BucketEntry {
                observation,
                position,
            })
            .collect();
        Self {
            date,
            label,
            entries,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries on one side.
    pub fn leg(&self, position: Position) -> impl Iterator<Item = &BucketEntry> {
        self.entries.iter().filter(move |e| e.position == position)
    }

    /// Whether a symbol is held on either side.
    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.iter().any(|e| e.symbol() == symbol)
    }

    /// Symbols in entry order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(BucketEntry::symbol)
    }
}

/// Return and volume buckets of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSet {
    /// Rebalancing date.
    pub date: NaiveDate,
    /// Return-ranked buckets, including the spread bucket.
    pub returns: BTreeMap<BucketLabel, Bucket>,
    /// Volume-ranked buckets, including the spread bucket.
    pub volume: BTreeMap<BucketLabel, Bucket>,
}

impl BucketSet {
    /// Buckets of one axis.
    pub const fn axis(&self, axis: Axis) -> &BTreeMap<BucketLabel, Bucket> {
        match axis {
            Axis::Returns => &self.returns,
            Axis::Volume => &self.volume,
        }
    }

    /// Look up a bucket by label.
    pub fn get(&self, label: &BucketLabel) -> Option<&Bucket> {
        self.axis(label.axis()).get(label)
    }
}
