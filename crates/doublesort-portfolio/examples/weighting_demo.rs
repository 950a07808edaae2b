//! Demonstration of doublesort weighting schemes
//!
//! This example shows how to:
//! - List the available weighting schemes and their aliases
//! - Weight one date's buckets with every scheme
//! - Inspect an intersection portfolio
//!
//! Run with: RUST_LOG=debug cargo run --example weighting_demo -p doublesort-portfolio

use chrono::NaiveDate;
use doublesort_data::{CrossSection, SecurityObservation};
use doublesort_portfolio::weighting::available_schemes;
use doublesort_portfolio::{ConflictPolicy, Intersector, PortfolioLabel, SchemeRegistry, weight_set};
use doublesort_signals::{BucketLabel, BucketSorter, Position, SorterConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Doublesort Weighting Schemes");
    println!("============================\n");

    for info in available_schemes() {
        println!("  {:20} {}", info.name, info.description);
        if !info.aliases.is_empty() {
            println!("  {:20} aliases: {}", "", info.aliases.join(", "));
        }
    }
    println!();

    let date = NaiveDate::from_ymd_opt(2024, 3, 29).ok_or("invalid date")?;
    let section = CrossSection::new(
        date,
        vec![
            SecurityObservation::new("AAPL", 171.5, 5.9e7, 0.031).with_volatility(0.21),
            SecurityObservation::new("MSFT", 420.7, 2.1e7, 0.017).with_volatility(0.18),
            SecurityObservation::new("NVDA", 903.6, 4.6e7, 0.142).with_volatility(0.45),
            SecurityObservation::new("XOM", 116.2, 1.7e7, 0.098).with_volatility(0.24),
            SecurityObservation::new("JNJ", 158.2, 7.1e6, -0.021).with_volatility(0.14),
            SecurityObservation::new("PFE", 27.7, 3.9e7, -0.004).with_volatility(0.26),
        ],
    );

    let sorter = BucketSorter::new(SorterConfig {
        return_buckets: 2,
        volume_buckets: 2,
    })?;
    let buckets = sorter.sort(&section);
    let registry = SchemeRegistry::standard();
    let intersector = Intersector::new(ConflictPolicy::KeepBoth);
    let label = PortfolioLabel::new(BucketLabel::returns(2), BucketLabel::volume(2));

    for scheme in registry.schemes() {
        let Some(weighting) = registry.get(scheme) else {
            continue;
        };
        let weighted = weight_set(&buckets, weighting);
        let dated = intersector.intersect(&weighted)?;

        println!("{scheme}:");
        if let Some(portfolio) = dated.portfolios.get(&label) {
            for row in &portfolio.rows {
                let side = if row.position == Position::Long { "+" } else { "-" };
                println!("  {side} {:6} weight {:>7.4}", row.symbol, row.weight);
            }
            println!("  {label} period return: {:.4}\n", portfolio.total_return());
        }
    }

    Ok(())
}
