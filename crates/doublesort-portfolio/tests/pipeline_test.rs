//! Integration tests for the double-sort pipeline.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use doublesort_data::{CrossSection, MarketData, SecurityObservation};
use doublesort_portfolio::{
    ConflictPolicy, Objective, Pipeline, PipelineConfig, PipelineOutput, PortfolioLabel,
    ReturnSeries, RowSource, WeightingScheme, WeightingSelection,
};
use doublesort_signals::{Axis, BucketLabel, Position};
use proptest::prelude::*;
use rstest::rstest;
use std::collections::BTreeSet;

fn month_end(month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month + 1, 1)
        .and_then(|d| d.pred_opt())
        .unwrap()
}

/// Ten securities; `S{i}` returns `(i + 1)%`, with volume increasing or
/// decreasing in `i`.
fn ten_securities(date: NaiveDate, volume_follows_returns: bool) -> CrossSection {
    let observations = (0..10)
        .map(|i| {
            let volume = if volume_follows_returns {
                1_000.0 * (i + 1) as f64
            } else {
                1_000.0 * (10 - i) as f64
            };
            SecurityObservation::new(format!("S{i}"), 20.0, volume, (i + 1) as f64 / 100.0)
                .with_volatility(0.1 + i as f64 / 100.0)
        })
        .collect();
    CrossSection::new(date, observations)
}

/// Deterministic multi-date panel with varying returns.
fn panel(dates: u32, universe: usize) -> MarketData {
    (1..=dates)
        .map(|month| {
            let observations = (0..universe)
                .map(|i| {
                    let phase = (i as f64 * 1.7 + month as f64 * 0.9).sin();
                    SecurityObservation::new(
                        format!("S{i:02}"),
                        50.0 + i as f64,
                        10_000.0 + 750.0 * ((i * 7 + month as usize * 3) % 11) as f64,
                        phase / 20.0,
                    )
                    .with_volatility(0.15 + 0.01 * (i % 5) as f64)
                })
                .collect();
            CrossSection::new(month_end(month), observations)
        })
        .collect()
}

fn pipeline(n: usize, m: usize, weighting: WeightingSelection) -> Pipeline {
    Pipeline::new(PipelineConfig {
        return_buckets: n,
        volume_buckets: m,
        weighting,
        ..Default::default()
    })
    .unwrap()
}

fn label(i: usize, j: usize) -> PortfolioLabel {
    PortfolioLabel::new(BucketLabel::returns(i), BucketLabel::volume(j))
}

#[test]
fn test_ten_securities_two_return_buckets_one_volume_bucket() {
    let date = month_end(1);
    let data: MarketData = [ten_securities(date, false)].into_iter().collect();
    let output = pipeline(2, 1, WeightingSelection::Fixed(WeightingScheme::Equal))
        .run(&data)
        .unwrap();

    let buckets = &output.buckets[0];
    assert_eq!(buckets.returns[&BucketLabel::returns(1)].len(), 5);
    assert_eq!(buckets.returns[&BucketLabel::returns(2)].len(), 5);
    assert_eq!(buckets.volume[&BucketLabel::volume(1)].len(), 10);

    // (n + 1) * (m + 1) portfolios including spread rows and columns
    assert_eq!(output.intersections.date(&date).unwrap().len(), 6);

    for (i, members) in [(1, 0..5), (2, 5..10)] {
        let portfolio = output.intersections.get(&date, &label(i, 1)).unwrap();
        assert_eq!(portfolio.len(), 5);
        // 1/5 from the return bucket plus 1/10 from the volume bucket
        for row in &portfolio.rows {
            assert_relative_eq!(row.weight, 0.2 + 0.1, epsilon = 1e-12);
        }

        let sum: f64 = members.map(|k| (k + 1) as f64 / 100.0).sum();
        let series = output.returns.get(&label(i, 1)).unwrap();
        assert_relative_eq!(series.values()[0], 0.3 * sum, epsilon = 1e-12);
    }
}

#[test]
fn test_aligned_signals_give_point_four_per_security() {
    let date = month_end(1);
    let data: MarketData = [ten_securities(date, true)].into_iter().collect();
    let output = pipeline(2, 2, WeightingSelection::Fixed(WeightingScheme::Equal))
        .run(&data)
        .unwrap();

    for (i, members) in [(1, 0..5), (2, 5..10)] {
        let portfolio = output.intersections.get(&date, &label(i, i)).unwrap();
        assert_eq!(portfolio.len(), 5);
        for row in &portfolio.rows {
            assert_relative_eq!(row.weight, 0.4, epsilon = 1e-12);
        }

        let sum: f64 = members.map(|k| (k + 1) as f64 / 100.0).sum();
        let value = output.returns.get(&label(i, i)).unwrap().values()[0];
        assert_relative_eq!(value, 0.4 * sum, epsilon = 1e-12);

        // Opposite corners share nothing and record no return
        assert!(output.intersections.get(&date, &label(i, 3 - i)).unwrap().is_empty());
        assert!(output.returns.get(&label(i, 3 - i)).is_none());
    }
}

#[test]
fn test_bucket_count_exceeding_universe() {
    let date = month_end(1);
    let observations = (0..3)
        .map(|i| SecurityObservation::new(format!("S{i}"), 10.0, 100.0 + i as f64, i as f64 / 10.0))
        .collect();
    let data: MarketData = [CrossSection::new(date, observations)].into_iter().collect();

    let output = pipeline(5, 1, WeightingSelection::Fixed(WeightingScheme::Volume))
        .run(&data)
        .unwrap();

    let buckets = &output.buckets[0];
    for i in 1..=3 {
        assert_eq!(buckets.returns[&BucketLabel::returns(i)].len(), 1);
    }
    for i in 4..=5 {
        assert!(buckets.returns[&BucketLabel::returns(i)].is_empty());
        assert!(output.intersections.get(&date, &label(i, 1)).unwrap().is_empty());
        assert!(output.returns.get(&label(i, 1)).is_none());
    }

    // R5-R1 is short-only
    let weighted = &output.weighted[0].returns[&BucketLabel::spread(Axis::Returns, 5)];
    assert_relative_eq!(weighted.leg_weight(Position::Long), 0.0, epsilon = 1e-12);
    assert_relative_eq!(weighted.leg_weight(Position::Short), -1.0, epsilon = 1e-12);
}

#[rstest]
#[case(WeightingScheme::Equal)]
#[case(WeightingScheme::Volume)]
#[case(WeightingScheme::InverseVolatility)]
#[case(WeightingScheme::DollarVolume)]
fn test_leg_weights_sum_to_one(#[case] scheme: WeightingScheme) {
    let output = pipeline(4, 3, WeightingSelection::Fixed(scheme))
        .run(&panel(3, 17))
        .unwrap();

    for set in &output.weighted {
        for bucket in set.returns.values().chain(set.volume.values()) {
            for position in [Position::Long, Position::Short] {
                let has_leg = bucket.rows.iter().any(|r| r.position == position);
                let expected = if has_leg { position.sign() } else { 0.0 };
                assert_relative_eq!(bucket.leg_weight(position), expected, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_intersections_hold_only_shared_symbols() {
    let output = pipeline(3, 2, WeightingSelection::Fixed(WeightingScheme::Equal))
        .run(&panel(2, 12))
        .unwrap();

    for (set, (_, portfolios)) in output.buckets.iter().zip(output.intersections.iter()) {
        for portfolio in portfolios.values() {
            let returns = &set.returns[&portfolio.label.returns];
            let volume = &set.volume[&portfolio.label.volume];
            for row in &portfolio.rows {
                assert!(returns.contains(&row.symbol) && volume.contains(&row.symbol));
            }
        }
    }
}

#[test]
fn test_period_return_equals_sum_of_weighted_returns() {
    let output = pipeline(3, 3, WeightingSelection::Fixed(WeightingScheme::DollarVolume))
        .run(&panel(4, 20))
        .unwrap();

    for (date, portfolios) in output.intersections.iter() {
        for (label, portfolio) in portfolios {
            let recorded = output.returns.get(label).and_then(|s| s.get(date));
            if portfolio.is_empty() {
                assert!(recorded.is_none());
            } else {
                assert_relative_eq!(recorded.unwrap(), portfolio.total_return(), epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_net_policy_collapses_a_symbol_held_on_both_sides() {
    let date = month_end(1);
    let data: MarketData = [ten_securities(date, false)].into_iter().collect();
    let config = PipelineConfig {
        return_buckets: 2,
        volume_buckets: 1,
        weighting: WeightingSelection::Fixed(WeightingScheme::Equal),
        conflict_policy: ConflictPolicy::Net,
        ..Default::default()
    };
    // V1-V1 holds every name long and short at 1/10
    let spread = PortfolioLabel::new(BucketLabel::returns(1), BucketLabel::spread(Axis::Volume, 1));

    let output = Pipeline::new(config).unwrap().run(&data).unwrap();
    let portfolio = output.intersections.get(&date, &spread).unwrap();
    assert_eq!(portfolio.len(), 5);
    let symbols: BTreeSet<_> = portfolio.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, BTreeSet::from(["S0", "S1", "S2", "S3", "S4"]));
    for row in &portfolio.rows {
        assert_eq!(row.source, RowSource::Netted);
        assert_eq!(row.position, Position::Long);
        assert_relative_eq!(row.weight, 0.2, epsilon = 1e-12);
    }
    let value = output.returns.get(&spread).unwrap().values()[0];
    assert_relative_eq!(value, 0.2 * 0.15, epsilon = 1e-12);

    let keep = Pipeline::new(PipelineConfig {
        conflict_policy: ConflictPolicy::KeepBoth,
        ..config
    })
    .unwrap()
    .run(&data)
    .unwrap();
    assert_eq!(keep.intersections.get(&date, &spread).unwrap().len(), 10);
}

#[test]
fn test_missing_volatility_keeps_inverse_volatility_weights() {
    let date = month_end(1);
    let mut section = ten_securities(date, false);
    section.observations[9].volatility = None;
    let data: MarketData = [section].into_iter().collect();

    let output = pipeline(1, 1, WeightingSelection::Fixed(WeightingScheme::InverseVolatility))
        .run(&data)
        .unwrap();

    let bucket = &output.weighted[0].returns[&BucketLabel::returns(1)];
    assert_eq!(bucket.len(), 10);
    assert_relative_eq!(bucket.leg_weight(Position::Long), 1.0, epsilon = 1e-12);
    let weight = |symbol: &str| {
        bucket
            .rows
            .iter()
            .find(|r| r.symbol() == symbol)
            .map(|r| r.weight)
            .unwrap()
    };
    // Volatilities 0.10 and 0.11
    assert_relative_eq!(weight("S0") / weight("S1"), 0.11 / 0.10, epsilon = 1e-9);
    assert!(weight("S0") > weight("S8"));
}

#[rstest]
#[case(ConflictPolicy::KeepBoth)]
#[case(ConflictPolicy::Net)]
#[case(ConflictPolicy::Exclude)]
fn test_runs_are_idempotent_and_parallel_matches_sequential(#[case] policy: ConflictPolicy) {
    let data = panel(6, 25);
    let config = PipelineConfig {
        return_buckets: 5,
        volume_buckets: 3,
        weighting: WeightingSelection::Fixed(WeightingScheme::InverseVolatility),
        conflict_policy: policy,
        ..Default::default()
    };

    let parallel = Pipeline::new(config).unwrap();
    let sequential = Pipeline::new(PipelineConfig {
        parallel: false,
        ..config
    })
    .unwrap();

    let first = parallel.run(&data).unwrap();
    let second = parallel.run(&data).unwrap();
    let third = sequential.run(&data).unwrap();

    let render = |output: &PipelineOutput| format!("{:?}", output.returns);
    assert_eq!(render(&first), render(&second));
    assert_eq!(render(&first), render(&third));
    assert_eq!(first.intersections, third.intersections);
}

/// Prefers the portfolio with the largest mean return.
#[derive(Debug)]
struct MeanReturn;

impl Objective for MeanReturn {
    fn name(&self) -> &str {
        "mean"
    }

    fn evaluate(&self, series: &ReturnSeries) -> Option<f64> {
        series.mean()
    }
}

#[test]
fn test_best_selection_reports_ranking() {
    let output = pipeline(3, 2, WeightingSelection::Best)
        .with_objective(MeanReturn)
        .run(&panel(4, 15))
        .unwrap();

    assert_eq!(output.ranking.len(), WeightingScheme::ALL.len());
    let best = output
        .ranking
        .iter()
        .filter_map(|s| s.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let chosen = output
        .ranking
        .iter()
        .find(|s| s.scheme == output.scheme)
        .and_then(|s| s.score)
        .unwrap();
    assert_relative_eq!(chosen, best, epsilon = 1e-12);
    assert!(output.best_portfolio.is_some());
}

#[test]
fn test_holdings_view() {
    let date = month_end(1);
    let data: MarketData = [ten_securities(date, false)].into_iter().collect();
    let output = pipeline(2, 1, WeightingSelection::Fixed(WeightingScheme::Equal))
        .run(&data)
        .unwrap();

    let holdings = output.intersections.holdings();
    let r1_v1: BTreeSet<_> = holdings
        .iter()
        .filter(|h| h.portfolio == label(1, 1))
        .map(|h| h.symbol.as_str())
        .collect();
    assert_eq!(r1_v1, BTreeSet::from(["S0", "S1", "S2", "S3", "S4"]));
    assert!(holdings.iter().all(|h| h.date == date));
}

proptest! {
    #[test]
    fn prop_leg_weights_hold_for_any_universe(
        universe in 0usize..30,
        n in 1usize..8,
        m in 1usize..5,
    ) {
        let output = pipeline(n, m, WeightingSelection::Fixed(WeightingScheme::Volume))
            .run(&panel(1, universe))
            .unwrap();
        for set in &output.weighted {
            for bucket in set.returns.values().chain(set.volume.values()) {
                for position in [Position::Long, Position::Short] {
                    let weight = bucket.leg_weight(position);
                    prop_assert!(weight.abs() < 1e-9 || (weight - position.sign()).abs() < 1e-9);
                }
            }
        }
    }
}
