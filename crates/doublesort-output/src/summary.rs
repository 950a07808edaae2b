//! Summary tables of a performance report.
//!
//! Per-portfolio metric tables for the terminal (ASCII) and for
//! documentation (Markdown), plus a returns x volume grid of one metric.

use crate::performance::{PerformanceReport, PerformanceStats};
use derive_more::Display;
use doublesort_portfolio::PortfolioLabel;
use doublesort_signals::BucketLabel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A reported statistic
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Compounded return
    #[display("Total Return")]
    TotalReturn,
    /// Annualised return
    #[display("Ann. Return")]
    AnnualizedReturn,
    /// Per-period volatility
    #[display("Volatility")]
    Volatility,
    /// Annualised volatility
    #[display("Ann. Volatility")]
    AnnualizedVolatility,
    /// Sharpe ratio
    #[display("Sharpe")]
    SharpeRatio,
    /// Maximum drawdown
    #[display("Max Drawdown")]
    MaxDrawdown,
    /// Value at risk
    #[display("VaR")]
    ValueAtRisk,
    /// Tracking error
    #[display("Tracking Error")]
    TrackingError,
    /// t-statistic against the benchmark
    #[display("t-stat")]
    TStat,
}

impl Metric {
    /// Every metric, in table column order.
    pub const ALL: [Self; 9] = [
        Self::TotalReturn,
        Self::AnnualizedReturn,
        Self::Volatility,
        Self::AnnualizedVolatility,
        Self::SharpeRatio,
        Self::MaxDrawdown,
        Self::ValueAtRisk,
        Self::TrackingError,
        Self::TStat,
    ];

    /// Value of the metric in a set of statistics.
    pub const fn value(self, stats: &PerformanceStats) -> Option<f64> {
        match self {
            Self::TotalReturn => stats.total_return,
            Self::AnnualizedReturn => stats.annualized_return,
            Self::Volatility => stats.volatility,
            Self::AnnualizedVolatility => stats.annualized_volatility,
            Self::SharpeRatio => stats.sharpe_ratio,
            Self::MaxDrawdown => stats.max_drawdown,
            Self::ValueAtRisk => stats.value_at_risk,
            Self::TrackingError => stats.tracking_error,
            Self::TStat => stats.t_stat,
        }
    }

    /// Whether the metric is shown as a percentage.
    pub const fn is_percentage(self) -> bool {
        !matches!(self, Self::SharpeRatio | Self::TStat)
    }

    fn format(self, value: Option<f64>) -> String {
        match value {
            None => "-".to_string(),
            Some(v) if self.is_percentage() => format!("{:.2}%", v * 100.0),
            Some(v) => format!("{:.3}", v),
        }
    }
}

impl PerformanceReport {
    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let width = 18 + 16 * Metric::ALL.len();
        let mut output = String::new();

        output.push_str("\nPortfolio Performance\n");
        output.push_str(&format!(
            "Periods per year: {}, risk-free rate: {:.4}, VaR level: {:.0}%\n",
            self.config.periods_per_year,
            self.config.risk_free_rate,
            self.config.confidence_level * 100.0
        ));
        output.push_str(&"=".repeat(width));
        output.push('\n');

        output.push_str(&format!("{:<18}", "Portfolio"));
        for metric in Metric::ALL {
            output.push_str(&format!("{:>16}", metric.to_string()));
        }
        output.push('\n');
        output.push_str(&"-".repeat(width));
        output.push('\n');

        for (label, stats) in &self.stats {
            output.push_str(&format!("{:<18}", label.to_string()));
            for metric in Metric::ALL {
                output.push_str(&format!("{:>16}", metric.format(metric.value(stats))));
            }
            output.push('\n');
        }

        output.push_str(&"=".repeat(width));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Portfolio Performance\n\n");
        output.push_str(&format!(
            "**Periods per year:** {} | **Risk-free rate:** {:.4} | **VaR level:** {:.0}%\n\n",
            self.config.periods_per_year,
            self.config.risk_free_rate,
            self.config.confidence_level * 100.0
        ));

        output.push_str("| Portfolio |");
        for metric in Metric::ALL {
            output.push_str(&format!(" {} |", metric));
        }
        output.push('\n');
        output.push_str("|-----------|");
        for _ in Metric::ALL {
            output.push_str("------|");
        }
        output.push('\n');

        for (label, stats) in &self.stats {
            output.push_str(&format!("| {} |", label));
            for metric in Metric::ALL {
                output.push_str(&format!(" {} |", metric.format(metric.value(stats))));
            }
            output.push('\n');
        }

        output
    }

    /// Portfolio with the highest value of a metric; ties keep the first label.
    pub fn best_by(&self, metric: Metric) -> Option<(&PortfolioLabel, f64)> {
        let mut best: Option<(&PortfolioLabel, f64)> = None;
        for (label, stats) in &self.stats {
            let Some(value) = metric.value(stats).filter(|v| v.is_finite()) else {
                continue;
            };
            if best.is_none_or(|(_, top)| value > top) {
                best = Some((label, value));
            }
        }
        best
    }

    /// Returns x volume grid of one metric.
    pub fn grid(&self, metric: Metric) -> MetricGrid {
        let mut rows = BTreeSet::new();
        let mut columns = BTreeSet::new();
        let mut cells = BTreeMap::new();
        for (label, stats) in &self.stats {
            rows.insert(label.returns);
            columns.insert(label.volume);
            if let Some(value) = metric.value(stats) {
                cells.insert((label.returns, label.volume), value);
            }
        }
        MetricGrid {
            metric,
            rows: rows.into_iter().collect(),
            columns: columns.into_iter().collect(),
            cells,
        }
    }
}

/// One metric laid out with return buckets as rows and volume buckets as
/// columns
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGrid {
    /// Metric shown
    pub metric: Metric,
    /// Return bucket labels, in order
    pub rows: Vec<BucketLabel>,
    /// Volume bucket labels, in order
    pub columns: Vec<BucketLabel>,
    /// Defined cells
    pub cells: BTreeMap<(BucketLabel, BucketLabel), f64>,
}

impl MetricGrid {
    /// Value of one cell.
    pub fn get(&self, returns: BucketLabel, volume: BucketLabel) -> Option<f64> {
        self.cells.get(&(returns, volume)).copied()
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let width = 10 + 12 * self.columns.len();
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", self.metric));
        output.push_str(&"=".repeat(width));
        output.push('\n');
        output.push_str(&format!("{:<10}", ""));
        for column in &self.columns {
            output.push_str(&format!("{:>12}", column.to_string()));
        }
        output.push('\n');
        output.push_str(&"-".repeat(width));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("{:<10}", row.to_string()));
            for column in &self.columns {
                let cell = self.metric.format(self.get(*row, *column));
                output.push_str(&format!("{:>12}", cell));
            }
            output.push('\n');
        }
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("## {}\n\n", self.metric));

        output.push_str("| |");
        for column in &self.columns {
            output.push_str(&format!(" {} |", column));
        }
        output.push('\n');
        output.push_str("|---|");
        for _ in &self.columns {
            output.push_str("---|");
        }
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("| {} |", row));
            for column in &self.columns {
                output.push_str(&format!(" {} |", self.metric.format(self.get(*row, *column))));
            }
            output.push('\n');
        }
        output
    }
}

impl fmt::Display for MetricGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ascii_table())
    }
}
