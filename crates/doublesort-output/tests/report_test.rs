//! Integration tests for performance reporting on pipeline output.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use doublesort_data::{CrossSection, MarketData, SecurityObservation};
use doublesort_output::{
    Metric, PerformanceAnalyzer, PerformanceConfig, SharpeObjective, universe_benchmark,
};
use doublesort_portfolio::{Pipeline, PipelineConfig, WeightingScheme, WeightingSelection};

fn panel() -> MarketData {
    (1..=8u32)
        .map(|month| {
            let date = NaiveDate::from_ymd_opt(2023, month, 15).unwrap();
            let observations = (0..12)
                .map(|i| {
                    let drift = ((i * 5 + month as usize * 3) % 7) as f64 - 3.0;
                    SecurityObservation::new(
                        format!("T{i:02}"),
                        30.0 + i as f64,
                        5_000.0 + 400.0 * ((i * 3 + month as usize) % 9) as f64,
                        drift / 100.0,
                    )
                    .with_volatility(0.2 + 0.02 * (i % 3) as f64)
                })
                .collect();
            CrossSection::new(date, observations)
        })
        .collect()
}

#[test]
fn test_full_reporting_workflow() {
    let data = panel();
    let output = Pipeline::new(PipelineConfig {
        return_buckets: 3,
        volume_buckets: 2,
        weighting: WeightingSelection::Fixed(WeightingScheme::Equal),
        ..Default::default()
    })
    .unwrap()
    .run(&data)
    .unwrap();

    let benchmark = universe_benchmark(&data);
    assert_eq!(benchmark.len(), 8);

    let analyzer = PerformanceAnalyzer::new(PerformanceConfig::default()).unwrap();
    let report = analyzer.analyze_all(&output.returns, Some(&benchmark));
    assert_eq!(report.len(), output.returns.len());

    for (label, stats) in &report.stats {
        let series = output.returns.get(label).unwrap();
        assert_eq!(stats.periods, series.len());
        if let Some(dd) = stats.max_drawdown {
            assert!(dd <= 0.0);
        }
        if let (Some(vol), Some(ann)) = (stats.volatility, stats.annualized_volatility) {
            assert_relative_eq!(ann, vol * 12f64.sqrt(), epsilon = 1e-12);
        }
        if let Some(sharpe) = stats.sharpe_ratio {
            let objective = SharpeObjective::default();
            assert_relative_eq!(
                sharpe,
                series.sharpe_ratio(objective.risk_free_rate).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    let ascii = report.to_ascii_table();
    assert!(ascii.contains("R3-R1_V2-V1"));
    let markdown = report.to_markdown();
    assert!(markdown.contains("| R1_V1 |"));

    let grid = report.grid(Metric::SharpeRatio);
    assert_eq!(grid.rows.len(), 4);
    assert_eq!(grid.columns.len(), 3);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"R1_V1\""));
}
