//! Aggregation of intersection portfolios into return series.

use crate::intersection::{IntersectionGrid, IntersectionPortfolio, PortfolioLabel};
use crate::series::{PortfolioReturns, ReturnObservation};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Period return of one portfolio.
///
/// The return is the sum of weighted returns. The volatility estimate
/// `Σ |w|·σ` is only given when every row carries a volatility. A portfolio
/// without rows has no return for the period.
pub fn period_return(portfolio: &IntersectionPortfolio) -> Option<ReturnObservation> {
    if portfolio.is_empty() {
        return None;
    }

    let volatility = portfolio
        .rows
        .iter()
        .map(|row| row.volatility.map(|sigma| row.weight.abs() * sigma))
        .sum::<Option<f64>>();

    Some(ReturnObservation {
        date: portfolio.date,
        value: portfolio.total_return(),
        volatility,
    })
}

/// Period returns of one date's portfolios.
pub fn aggregate_date(
    portfolios: &BTreeMap<PortfolioLabel, IntersectionPortfolio>,
) -> Vec<(PortfolioLabel, ReturnObservation)> {
    portfolios
        .iter()
        .filter_map(|(label, portfolio)| period_return(portfolio).map(|obs| (*label, obs)))
        .collect()
}

/// Return series of every portfolio in the grid.
pub fn aggregate(grid: &IntersectionGrid) -> PortfolioReturns {
    let mut returns = PortfolioReturns::new();
    for (date, portfolios) in grid.iter() {
        let period = aggregate_date(portfolios);
        debug!(%date, observed = period.len(), total = portfolios.len(), "aggregated date");
        if let Err(e) = returns.merge_period(period) {
            warn!(%date, error = %e, "dropping period");
        }
    }
    returns
}

/// Dates on which a portfolio was observed.
pub fn observed_dates(returns: &PortfolioReturns, label: &PortfolioLabel) -> Vec<NaiveDate> {
    returns.get(label).map(|s| s.dates()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersection::{DatedIntersections, IntersectionRow, RowSource};
    use approx::assert_relative_eq;
    use doublesort_signals::{BucketLabel, Position};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn label(i: usize) -> PortfolioLabel {
        PortfolioLabel::new(BucketLabel::returns(i), BucketLabel::volume(1))
    }

    fn row(symbol: &str, weight: f64, returns: f64, volatility: Option<f64>) -> IntersectionRow {
        IntersectionRow {
            symbol: symbol.to_string(),
            position: Position::Long,
            weight,
            weighted_return: weight * returns,
            returns,
            volatility,
            source: RowSource::Both,
        }
    }

    fn portfolio(date: NaiveDate, i: usize, rows: Vec<IntersectionRow>) -> IntersectionPortfolio {
        IntersectionPortfolio {
            date,
            label: label(i),
            rows,
        }
    }

    #[test]
    fn test_period_return_sums_weighted_returns() {
        let p = portfolio(
            day(1),
            1,
            vec![
                row("A", 0.5, 0.02, Some(0.1)),
                row("B", 1.5, -0.01, Some(0.2)),
            ],
        );
        let obs = period_return(&p).unwrap();
        assert_relative_eq!(obs.value, 0.5 * 0.02 - 1.5 * 0.01, epsilon = 1e-12);
        assert_relative_eq!(obs.volatility.unwrap(), 0.5 * 0.1 + 1.5 * 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_period_volatility_requires_every_row() {
        let p = portfolio(
            day(1),
            1,
            vec![row("A", 1.0, 0.02, Some(0.1)), row("B", 1.0, 0.01, None)],
        );
        assert!(period_return(&p).unwrap().volatility.is_none());
    }

    #[test]
    fn test_empty_portfolios_contribute_no_observation() {
        let mut grid = IntersectionGrid::new();
        for (date, rows) in [(day(1), true), (day(2), false), (day(3), true)] {
            let first = if rows {
                vec![row("A", 1.0, 0.01, None)]
            } else {
                Vec::new()
            };
            grid.insert(DatedIntersections {
                date,
                portfolios: BTreeMap::from([
                    (label(1), portfolio(date, 1, first)),
                    (label(2), portfolio(date, 2, Vec::new())),
                ]),
            });
        }

        let returns = aggregate(&grid);
        assert_eq!(returns.len(), 1);
        assert_eq!(observed_dates(&returns, &label(1)), vec![day(1), day(3)]);
        assert!(returns.get(&label(2)).is_none());
        assert!(observed_dates(&returns, &label(2)).is_empty());
    }
}
