//! Inverse Volatility Weight
//!
//! Weight proportional to `1 / volatility` within the leg. Volatility is
//! taken from the observation as prepared upstream. A missing or
//! non-positive value takes the median score of the rest of the leg.

use super::{Weighting, WeightingScheme};
use doublesort_data::SecurityObservation;

/// Inverse-volatility weighting within each leg
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseVolatilityWeight;

impl Weighting for InverseVolatilityWeight {
    fn scheme(&self) -> WeightingScheme {
        WeightingScheme::InverseVolatility
    }

    fn score(&self, observation: &SecurityObservation) -> Option<f64> {
        observation.volatility().map(|vol| 1.0 / vol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use doublesort_signals::{Bucket, BucketLabel, Position};

    fn bucket(vols: &[Option<f64>]) -> Bucket {
        Bucket::from_observations(
            NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            BucketLabel::returns(2),
            vols.iter().enumerate().map(|(i, vol)| {
                let mut obs = SecurityObservation::new(format!("S{i}"), 10.0, 100.0, 0.01);
                obs.volatility = *vol;
                obs
            }),
            Position::Long,
        )
    }

    #[test]
    fn test_inverse_volatility_weights() {
        // Inverse vols 10 and 5
        let weighted = InverseVolatilityWeight.apply(&bucket(&[Some(0.1), Some(0.2)]));
        assert_relative_eq!(weighted.rows[0].weight, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(weighted.rows[1].weight, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_volatility_takes_median_score() {
        // Inverse vols 10 and 5, the missing name gets 7.5
        let weighted = InverseVolatilityWeight.apply(&bucket(&[Some(0.1), Some(0.2), None]));
        assert_relative_eq!(weighted.rows[0].weight, 10.0 / 22.5, epsilon = 1e-12);
        assert_relative_eq!(weighted.rows[1].weight, 5.0 / 22.5, epsilon = 1e-12);
        assert_relative_eq!(weighted.rows[2].weight, 7.5 / 22.5, epsilon = 1e-12);

        let weighted = InverseVolatilityWeight.apply(&bucket(&[Some(0.1), Some(0.0)]));
        assert_relative_eq!(weighted.rows[0].weight, 0.5, epsilon = 1e-12);
        assert_relative_eq!(weighted.rows[1].weight, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_no_volatility_falls_back_to_equal() {
        let weighted = InverseVolatilityWeight.apply(&bucket(&[None, None, None, None]));
        for row in &weighted.rows {
            assert_relative_eq!(row.weight, 0.25, epsilon = 1e-12);
        }
        assert_relative_eq!(weighted.leg_weight(Position::Long), 1.0, epsilon = 1e-12);
    }
}
