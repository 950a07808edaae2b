//! Volume Weight
//!
//! Weight proportional to traded volume within the leg.

use super::{Weighting, WeightingScheme};
use doublesort_data::SecurityObservation;

/// Volume-proportional weighting within each leg
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeWeight;

impl Weighting for VolumeWeight {
    fn scheme(&self) -> WeightingScheme {
        WeightingScheme::Volume
    }

    fn score(&self, observation: &SecurityObservation) -> Option<f64> {
        observation.volume()
    }
}
