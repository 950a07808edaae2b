//! Best-method search
//!
//! Runs weighting, intersection and aggregation once per candidate scheme
//! and keeps the scheme whose best portfolio scores highest under an
//! [`Objective`].

use crate::aggregate::aggregate;
use crate::intersection::{ConflictPolicy, IntersectionGrid, Intersector, PortfolioLabel};
use crate::series::{PortfolioReturns, ReturnSeries};
use crate::weighting::{
    SchemeRegistry, WeightedBucketSet, Weighting, WeightingError, WeightingScheme, weight_set,
};
use doublesort_signals::BucketSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the best-method search
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// No candidate scheme was given
    #[error("No weighting schemes to search")]
    EmptySchemes,

    /// Every candidate scored `None`
    #[error("No weighting scheme produced a defined {objective} score")]
    NoDefinedScore {
        /// Objective name
        objective: String,
    },

    /// A candidate has no registered implementation
    #[error(transparent)]
    Weighting(#[from] WeightingError),
}

/// Scores a portfolio's return series; higher is better.
pub trait Objective: fmt::Debug + Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Score of a series, `None` when undefined.
    fn evaluate(&self, series: &ReturnSeries) -> Option<f64>;
}

/// Per-period Sharpe ratio objective
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SharpeObjective {
    /// Per-period risk-free rate
    pub risk_free_rate: f64,
}

impl SharpeObjective {
    /// Create the objective with a per-period risk-free rate.
    pub const fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }
}

impl Objective for SharpeObjective {
    fn name(&self) -> &str {
        "sharpe"
    }

    fn evaluate(&self, series: &ReturnSeries) -> Option<f64> {
        series.sharpe_ratio(self.risk_free_rate)
    }
}

/// Everything one scheme produced over a run
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeRun {
    /// Scheme used
    pub scheme: WeightingScheme,
    /// Weighted buckets per date
    pub weighted: Vec<WeightedBucketSet>,
    /// Intersection portfolios per date
    pub intersections: IntersectionGrid,
    /// Return series per portfolio
    pub returns: PortfolioReturns,
}

impl SchemeRun {
    /// Best portfolio under an objective; ties keep the first label.
    pub fn best_portfolio(&self, objective: &dyn Objective) -> Option<(PortfolioLabel, f64)> {
        let mut best: Option<(PortfolioLabel, f64)> = None;
        for (label, series) in &self.returns {
            let Some(score) = objective.evaluate(series).filter(|s| s.is_finite()) else {
                continue;
            };
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((*label, score));
            }
        }
        best
    }
}

/// Weight, intersect and aggregate every date with one scheme.
pub fn evaluate_scheme(
    sets: &[BucketSet],
    weighting: &dyn Weighting,
    intersector: &Intersector,
    parallel: bool,
) -> SchemeRun {
    let weighted: Vec<WeightedBucketSet> = if parallel {
        sets.par_iter().map(|set| weight_set(set, weighting)).collect()
    } else {
        sets.iter().map(|set| weight_set(set, weighting)).collect()
    };

    let intersections = intersector.intersect_all(&weighted);
    let returns = aggregate(&intersections);

    debug!(
        scheme = %weighting.scheme(),
        dates = intersections.len(),
        portfolios = returns.len(),
        "evaluated scheme"
    );

    SchemeRun {
        scheme: weighting.scheme(),
        weighted,
        intersections,
        returns,
    }
}

/// Score of one candidate scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchemeScore {
    /// Candidate scheme
    pub scheme: WeightingScheme,
    /// Its best portfolio, if any scored
    pub portfolio: Option<PortfolioLabel>,
    /// Score of that portfolio
    pub score: Option<f64>,
}

/// Result of a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Winning scheme
    pub scheme: WeightingScheme,
    /// Winning scheme's best portfolio
    pub portfolio: PortfolioLabel,
    /// Score of that portfolio
    pub score: f64,
    /// Full output of the winning scheme
    pub run: SchemeRun,
    /// Every candidate's score, in candidate order
    pub ranking: Vec<SchemeScore>,
}

impl SearchOutcome {
    /// Weighted buckets of the winning scheme.
    pub fn weighted(&self) -> &[WeightedBucketSet] {
        &self.run.weighted
    }
}

/// Chooses the weighting scheme with the highest objective
#[derive(Debug)]
pub struct BestMethodSearch {
    schemes: Vec<WeightingScheme>,
    intersector: Intersector,
    registry: SchemeRegistry,
    parallel: bool,
}

impl BestMethodSearch {
    /// Create a search over `schemes`, tried in the given order.
    pub fn new(
        schemes: impl IntoIterator<Item = WeightingScheme>,
        policy: ConflictPolicy,
    ) -> Result<Self, SearchError> {
        let schemes: Vec<_> = schemes.into_iter().collect();
        if schemes.is_empty() {
            return Err(SearchError::EmptySchemes);
        }
        Ok(Self {
            schemes,
            intersector: Intersector::new(policy),
            registry: SchemeRegistry::standard(),
            parallel: true,
        })
    }

    /// Search over every built-in scheme.
    pub fn all(policy: ConflictPolicy) -> Self {
        Self {
            schemes: WeightingScheme::ALL.to_vec(),
            intersector: Intersector::new(policy),
            registry: SchemeRegistry::standard(),
            parallel: true,
        }
    }

    /// Evaluate candidates on the rayon pool (default) or sequentially.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Candidate schemes.
    pub fn schemes(&self) -> &[WeightingScheme] {
        &self.schemes
    }

    /// Run every candidate and keep the best.
    pub fn run(
        &self,
        sets: &[BucketSet],
        objective: &dyn Objective,
    ) -> Result<SearchOutcome, SearchError> {
        let weightings = self
            .schemes
            .iter()
            .map(|scheme| {
                self.registry
                    .get(*scheme)
                    .ok_or_else(|| WeightingError::UnknownScheme(scheme.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut runs: Vec<(SchemeRun, Option<(PortfolioLabel, f64)>)> = if self.parallel {
            weightings
                .par_iter()
                .map(|weighting| self.score_scheme(sets, *weighting, objective))
                .collect()
        } else {
            weightings
                .iter()
                .map(|weighting| self.score_scheme(sets, *weighting, objective))
                .collect()
        };

        let ranking: Vec<SchemeScore> = runs
            .iter()
            .map(|(run, best)| SchemeScore {
                scheme: run.scheme,
                portfolio: best.map(|(label, _)| label),
                score: best.map(|(_, score)| score),
            })
            .collect();

        let mut winner: Option<(usize, PortfolioLabel, f64)> = None;
        for (i, (_, best)) in runs.iter().enumerate() {
            if let Some((label, score)) = best {
                if winner.is_none_or(|(_, _, top)| *score > top) {
                    winner = Some((i, *label, *score));
                }
            }
        }

        let (index, portfolio, score) = winner.ok_or_else(|| SearchError::NoDefinedScore {
            objective: objective.name().to_string(),
        })?;
        let (run, _) = runs.swap_remove(index);

        info!(
            scheme = %run.scheme,
            %portfolio,
            score,
            objective = objective.name(),
            "selected weighting scheme"
        );

        Ok(SearchOutcome {
            scheme: run.scheme,
            portfolio,
            score,
            run,
            ranking,
        })
    }

    fn score_scheme(
        &self,
        sets: &[BucketSet],
        weighting: &dyn Weighting,
        objective: &dyn Objective,
    ) -> (SchemeRun, Option<(PortfolioLabel, f64)>) {
        let run = evaluate_scheme(sets, weighting, &self.intersector, self.parallel);
        let best = run.best_portfolio(objective);
        (run, best)
    }
}
