//! Demonstration of a doublesort backtest
//!
//! This example shows how to:
//! - Build a synthetic cross-sectional panel
//! - Search every weighting scheme for the best Sharpe ratio
//! - Print the performance table and a returns x volume grid
//!
//! Run with: RUST_LOG=doublesort=debug cargo run --example backtest_demo -p doublesort

use chrono::NaiveDate;
use doublesort::data::{CrossSection, MarketData, SecurityObservation};
use doublesort::output::Metric;
use doublesort::portfolio::{PipelineConfig, WeightingSelection};
use doublesort::{Backtest, BacktestConfig};
use tracing_subscriber::EnvFilter;

fn synthetic_panel(months: u32, universe: usize) -> MarketData {
    (1..=months)
        .filter_map(|month| {
            let year = 2022 + (month as i32 - 1) / 12;
            let date = NaiveDate::from_ymd_opt(year, (month - 1) % 12 + 1, 28)?;
            let observations = (0..universe)
                .map(|i| {
                    let signal = ((i as f64 * 0.37 + month as f64 * 1.3).sin()
                        + (i as f64 * 0.11).cos())
                        / 25.0;
                    SecurityObservation::new(
                        format!("SEC{i:03}"),
                        40.0 + (i % 17) as f64,
                        1.0e5 * (1.0 + ((i * 13 + month as usize * 7) % 23) as f64),
                        signal,
                    )
                    .with_volatility(0.12 + 0.01 * (i % 9) as f64)
                })
                .collect();
            Some(CrossSection::new(date, observations))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Doublesort Backtest Demo");
    println!("========================\n");

    let data = synthetic_panel(36, 120);
    println!("Panel: {} dates, {} securities per date\n", data.len(), 120);

    let config = BacktestConfig {
        pipeline: PipelineConfig {
            return_buckets: 5,
            volume_buckets: 3,
            weighting: WeightingSelection::Best,
            ..Default::default()
        },
        ..Default::default()
    };

    let result = Backtest::new(config)?.run(&data)?;

    println!("Weighting scheme ranking:");
    println!("-------------------------");
    for score in &result.output.ranking {
        let portfolio = score
            .portfolio
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        match score.score {
            Some(value) => println!(
                "  {:20} {:>10.4}  ({})",
                score.scheme.to_string(),
                value,
                portfolio
            ),
            None => println!("  {:20} {:>10}", score.scheme.to_string(), "undefined"),
        }
    }
    println!("\nSelected: {}", result.output.scheme);

    println!("{}", result.report.to_ascii_table());
    println!("{}", result.report.grid(Metric::SharpeRatio));

    Ok(())
}
