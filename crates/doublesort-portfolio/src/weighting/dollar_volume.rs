//! Dollar Volume Weight
//!
//! Weight proportional to price times volume within the leg.

use super::{Weighting, WeightingScheme};
use doublesort_data::SecurityObservation;

/// Dollar-volume-proportional weighting within each leg
#[derive(Debug, Clone, Copy, Default)]
pub struct DollarVolumeWeight;

impl Weighting for DollarVolumeWeight {
    fn scheme(&self) -> WeightingScheme {
        WeightingScheme::DollarVolume
    }

    fn score(&self, observation: &SecurityObservation) -> Option<f64> {
        observation.dollar_volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use doublesort_signals::{Bucket, BucketEntry, BucketLabel, Position};

    #[test]
    fn test_dollar_volume_weights_short_leg() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        let mut bucket = Bucket::empty(date, BucketLabel::returns(1));
        // Dollar volumes: 1000 and 3000
        for (symbol, price, volume) in [("A", 10.0, 100.0), ("B", 30.0, 100.0)] {
            bucket.entries.push(BucketEntry {
                observation: SecurityObservation::new(symbol, price, volume, 0.04),
                position: Position::Short,
            });
        }

        let weighted = DollarVolumeWeight.apply(&bucket);
        assert_relative_eq!(weighted.rows[0].weight, -0.25, epsilon = 1e-12);
        assert_relative_eq!(weighted.rows[1].weight, -0.75, epsilon = 1e-12);
        assert_relative_eq!(weighted.leg_weight(Position::Short), -1.0, epsilon = 1e-12);
        assert_eq!(weighted.leg_weight(Position::Long), 0.0);
        assert_relative_eq!(weighted.total_return(), -0.04, epsilon = 1e-12);
    }
}
