//! Bucket Sorter
//!
//! Ranks one date's eligible securities by period return and by traded
//! volume, then cuts each ranking into contiguous quantile slices.
//!
//! Slice `i` of `k` covers `[floor(i * len / k), floor((i + 1) * len / k))`
//! of the descending ranking, so every security lands in exactly one slice
//! and slice sizes differ by at most one. Labels run from lowest to highest:
//! `R1` holds the worst returns, `Rk` the best.

use crate::bucket::{Axis, Bucket, BucketEntry, BucketLabel, BucketSet, Position};
use chrono::NaiveDate;
use doublesort_data::{CrossSection, SecurityObservation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised when configuring the sorter
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// A bucket count of zero was requested
    #[error("Invalid bucket count for axis {axis}: {count} (must be at least 1)")]
    InvalidBucketCount {
        /// Axis the count was requested for
        axis: Axis,
        /// Requested count
        count: usize,
    },
}

/// Configuration for the BucketSorter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Number of return-ranked buckets (default: 5)
    pub return_buckets: usize,
    /// Number of volume-ranked buckets (default: 3)
    pub volume_buckets: usize,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            return_buckets: 5,
            volume_buckets: 3,
        }
    }
}

impl SorterConfig {
    /// Reject zero bucket counts.
    pub const fn validate(&self) -> Result<(), SignalError> {
        if self.return_buckets == 0 {
            return Err(SignalError::InvalidBucketCount {
                axis: Axis::Returns,
                count: self.return_buckets,
            });
        }
        if self.volume_buckets == 0 {
            return Err(SignalError::InvalidBucketCount {
                axis: Axis::Volume,
                count: self.volume_buckets,
            });
        }
        Ok(())
    }
}

/// Start offset of slice `i` when cutting `len` items into `slices` parts.
pub const fn slice_boundary(i: usize, len: usize, slices: usize) -> usize {
    if slices == 0 { 0 } else { i * len / slices }
}

/// Builds return and volume buckets for a cross-section
#[derive(Debug, Clone)]
pub struct BucketSorter {
    config: SorterConfig,
}

impl BucketSorter {
    /// Create a sorter, rejecting zero bucket counts.
    pub const fn new(config: SorterConfig) -> Result<Self, SignalError> {
        match config.validate() {
            Ok(()) => Ok(Self { config }),
            Err(e) => Err(e),
        }
    }

    /// Sorter configuration.
    pub const fn config(&self) -> &SorterConfig {
        &self.config
    }

    /// Build the buckets of one date.
    ///
    /// Securities missing a price, volume or return are dropped first. When a
    /// bucket count exceeds the eligible count, the upper labels are empty.
    ///
    /// # Arguments
    ///
    /// * `section` - Securities observed on the rebalancing date
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use doublesort_data::{CrossSection, SecurityObservation};
    /// use doublesort_signals::{BucketLabel, BucketSorter, SorterConfig};
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
    ///
    /// let config = SorterConfig { return_buckets: 2, volume_buckets: 1 };
    /// let buckets = BucketSorter::new(config).unwrap().sort(&section);
    ///
    /// // R1 holds the two lowest returns
    /// let r1 = &buckets.returns[&BucketLabel::returns(1)];
    /// assert!(r1.contains("B") && r1.contains("D"));
    /// assert_eq!(buckets.volume[&BucketLabel::volume(1)].len(), 4);
    /// ```
    pub fn sort(&self, section: &CrossSection) -> BucketSet {
        let eligible: Vec<&SecurityObservation> = section.eligible().collect();

        debug!(
            date = %section.date,
            eligible = eligible.len(),
            dropped = section.len() - eligible.len(),
            "sorting cross-section"
        );

        BucketSet {
            date: section.date,
            returns: rank_buckets(
                section.date,
                &eligible,
                Axis::Returns,
                self.config.return_buckets,
                SecurityObservation::returns,
            ),
            volume: rank_buckets(
                section.date,
                &eligible,
                Axis::Volume,
                self.config.volume_buckets,
                SecurityObservation::volume,
            ),
        }
    }
}

fn rank_buckets(
    date: NaiveDate,
    eligible: &[&SecurityObservation],
    axis: Axis,
    count: usize,
    key: impl Fn(&SecurityObservation) -> Option<f64>,
) -> BTreeMap<BucketLabel, Bucket> {
    let mut ranked: Vec<(f64, &SecurityObservation)> = eligible
        .iter()
        .filter_map(|obs| key(obs).map(|value| (value, *obs)))
        .collect();
    ranked.sort_by(|(a, obs_a), (b, obs_b)| {
        b.total_cmp(a).then_with(|| obs_a.symbol.cmp(&obs_b.symbol))
    });

    let len = ranked.len();
    let slices = count.min(len);

    let mut buckets: BTreeMap<BucketLabel, Bucket> = (1..=count)
        .map(|index| {
            let label = BucketLabel::Rank { axis, index };
            (label, Bucket::empty(date, label))
        })
        .collect();

    for i in 0..slices {
        let start = slice_boundary(i, len, slices);
        let end = slice_boundary(i + 1, len, slices);
        let label = BucketLabel::Rank {
            axis,
            index: slices - i,
        };
        let bucket = Bucket::from_observations(
            date,
            label,
            ranked[start..end].iter().map(|(_, obs)| (*obs).clone()),
            Position::Long,
        );
        buckets.insert(label, bucket);
    }

    let spread = spread_bucket(date, axis, count, &buckets);
    buckets.insert(spread.label, spread);
    buckets
}

fn spread_bucket(
    date: NaiveDate,
    axis: Axis,
    top: usize,
    buckets: &BTreeMap<BucketLabel, Bucket>,
) -> Bucket {
    let leg = |index: usize, position: Position| {
        buckets
            .get(&BucketLabel::Rank { axis, index })
            .into_iter()
            .flat_map(|bucket| bucket.entries.iter())
            .map(move |entry| BucketEntry {
                observation: entry.observation.clone(),
                position,
            })
    };

    Bucket {
        date,
        label: BucketLabel::spread(axis, top),
        entries: leg(top, Position::Long)
            .chain(leg(1, Position::Short))
            .collect(),
    }
}
