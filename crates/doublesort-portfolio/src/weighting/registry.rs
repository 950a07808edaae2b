//! Scheme Registry
//!
//! Central table of the weighting schemes: metadata for name lookup, and a
//! registry mapping each scheme to its implementation, built once per
//! pipeline.

use super::{
    DollarVolumeWeight, EqualWeight, InverseVolatilityWeight, VolumeWeight, Weighting,
    WeightingScheme,
};
use std::collections::BTreeMap;

/// Weighting scheme metadata
#[derive(Debug, Clone)]
pub struct SchemeInfo {
    /// Scheme variant
    pub scheme: WeightingScheme,
    /// Canonical name
    pub name: &'static str,
    /// Alternative names accepted when parsing
    pub aliases: &'static [&'static str],
    /// Brief description of the formula
    pub description: &'static str,
    /// Observation fields the formula reads
    pub required_fields: &'static [&'static str],
}

/// Get all available scheme info, in enumeration order
pub fn available_schemes() -> Vec<SchemeInfo> {
    vec![
        SchemeInfo {
            scheme: WeightingScheme::Equal,
            name: "equal",
            aliases: &["equi"],
            description: "Equal weight within each leg",
            required_fields: &[],
        },
        SchemeInfo {
            scheme: WeightingScheme::Volume,
            name: "volume",
            aliases: &[],
            description: "Weight proportional to traded volume",
            required_fields: &["volume"],
        },
        SchemeInfo {
            scheme: WeightingScheme::InverseVolatility,
            name: "inverse_volatility",
            aliases: &["vol"],
            description: "Weight proportional to the inverse of trailing volatility",
            required_fields: &["volatility"],
        },
        SchemeInfo {
            scheme: WeightingScheme::DollarVolume,
            name: "dollar_volume",
            aliases: &["volumexprice"],
            description: "Weight proportional to price times volume",
            required_fields: &["price", "volume"],
        },
    ]
}

/// Get scheme info by canonical name or alias
pub fn get_scheme_info(name: &str) -> Option<SchemeInfo> {
    available_schemes()
        .into_iter()
        .find(|info| info.name == name || info.aliases.contains(&name))
}

/// Lookup table from scheme to implementation
#[derive(Debug)]
pub struct SchemeRegistry {
    schemes: BTreeMap<WeightingScheme, Box<dyn Weighting>>,
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchemeRegistry {
    /// Registry holding every built-in scheme.
    pub fn standard() -> Self {
        let implementations: [Box<dyn Weighting>; 4] = [
            Box::new(EqualWeight),
            Box::new(VolumeWeight),
            Box::new(InverseVolatilityWeight),
            Box::new(DollarVolumeWeight),
        ];
        Self {
            schemes: implementations
                .into_iter()
                .map(|weighting| (weighting.scheme(), weighting))
                .collect(),
        }
    }

    /// Implementation of a scheme.
    pub fn get(&self, scheme: WeightingScheme) -> Option<&dyn Weighting> {
        self.schemes.get(&scheme).map(|weighting| &**weighting)
    }

    /// Registered schemes in enumeration order.
    pub fn schemes(&self) -> impl Iterator<Item = WeightingScheme> + '_ {
        self.schemes.keys().copied()
    }
}
