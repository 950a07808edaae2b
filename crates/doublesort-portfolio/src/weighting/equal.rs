//! Equal Weight
//!
//! Every security of a leg receives `1 / leg_size` (negated on the short
//! leg).

use super::{Weighting, WeightingScheme};
use doublesort_data::SecurityObservation;

/// Equal weighting within each leg
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeight;

impl Weighting for EqualWeight {
    fn scheme(&self) -> WeightingScheme {
        WeightingScheme::Equal
    }

    fn score(&self, _observation: &SecurityObservation) -> Option<f64> {
        Some(1.0)
    }
}
