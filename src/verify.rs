//! Read-back verification of the stored numeric columns: a sample, the
//! Pearson correlation matrix and a per-column statistical summary.

use crate::db::SalesDatabase;
use crate::error::Result;
use serde::Serialize;
use tracing::{info, instrument, warn};

pub const NUMERIC_COLUMNS: [&str; 4] = ["Sales", "Profit", "Quantity", "Discount"];
const SAMPLE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: &'static str,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub rows: usize,
    pub sample: Vec<[f64; 4]>,
    /// Indexed like `NUMERIC_COLUMNS`; NaN where a column has no variance
    pub correlation: [[f64; 4]; 4],
    pub stats: Vec<ColumnStats>,
}

#[instrument(skip_all)]
pub fn verify(db: &SalesDatabase) -> Result<VerificationReport> {
    let rows = db.numeric_rows()?;
    if rows.is_empty() {
        warn!("Table is empty, nothing to verify");
    }
    let report = VerificationReport::from_rows(&rows);
    info!(rows = report.rows, "Verification computed");
    Ok(report)
}

impl VerificationReport {
    pub fn from_rows(rows: &[[f64; 4]]) -> Self {
        let columns: Vec<Vec<f64>> = (0..4)
            .map(|c| rows.iter().map(|r| r[c]).collect())
            .collect();

        let mut correlation = [[f64::NAN; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                correlation[i][j] = pearson(&columns[i], &columns[j]);
            }
        }

        let stats = NUMERIC_COLUMNS
            .iter()
            .zip(&columns)
            .map(|(name, values)| ColumnStats::of(name, values))
            .collect();

        Self {
            rows: rows.len(),
            sample: rows.iter().take(SAMPLE_ROWS).copied().collect(),
            correlation,
            stats,
        }
    }

    pub fn correlation_between(&self, a: &str, b: &str) -> Option<f64> {
        let i = NUMERIC_COLUMNS.iter().position(|c| *c == a)?;
        let j = NUMERIC_COLUMNS.iter().position(|c| *c == b)?;
        Some(self.correlation[i][j])
    }

    pub fn print(&self) {
        println!("{}", "=".repeat(60));
        println!("DATA VERIFICATION");
        println!("{}", "=".repeat(60));

        if self.rows == 0 {
            println!("\nTable 'sales' is empty.");
            return;
        }

        println!("\nSample data (first {} rows):", self.sample.len());
        print_header();
        for row in &self.sample {
            println!(
                "{:>12.4}{:>12.4}{:>12.0}{:>12.2}",
                row[0], row[1], row[2], row[3]
            );
        }

        println!("\nCorrelation matrix:");
        print!("{:>12}", "");
        print_header();
        for (name, row) in NUMERIC_COLUMNS.iter().zip(&self.correlation) {
            print!("{name:>12}");
            for value in row {
                print!("{value:>12.3}");
            }
            println!();
        }

        println!("\nStatistical summary:");
        print!("{:>12}", "");
        print_header();
        let lines: [(&str, fn(&ColumnStats) -> f64); 8] = [
            ("count", |s| s.count as f64),
            ("mean", |s| s.mean),
            ("std", |s| s.std),
            ("min", |s| s.min),
            ("25%", |s| s.p25),
            ("50%", |s| s.p50),
            ("75%", |s| s.p75),
            ("max", |s| s.max),
        ];
        for (label, get) in lines {
            print!("{label:>12}");
            for stats in &self.stats {
                print!("{:>12.4}", get(stats));
            }
            println!();
        }
        println!();
    }
}

fn print_header() {
    for name in NUMERIC_COLUMNS {
        print!("{name:>12}");
    }
    println!();
}

impl ColumnStats {
    pub fn of(column: &'static str, values: &[f64]) -> Self {
        let count = values.len();
        let mean = mean(values);
        let std = if count > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            column,
            count,
            mean,
            std,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation between closest ranks; `sorted` must be ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Pearson correlation coefficient; NaN when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return f64::NAN;
    }
    cov / (vx.sqrt() * vy.sqrt())
}
