//! Diagnostic statistics printed while cleaning. Nothing downstream depends on
//! them.

use crate::cleaner::duplicate_count;
use crate::constants::SOURCE_COLUMNS;
use crate::types::{CleanedRecord, RawRecord};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use tracing::info;

const HEAD_ROWS: usize = 5;
const TOP_N: usize = 10;

/// Shape of the raw source before any cleaning.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub total_rows: usize,
    pub head: Vec<RawRecord>,
    /// Missing values per source column, in column order
    pub missing: Vec<(&'static str, usize)>,
    pub duplicate_rows: usize,
}

impl SourceProfile {
    pub fn of(records: &[RawRecord]) -> Self {
        let missing = SOURCE_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let count = records.iter().filter(|r| r.value(idx).is_none()).count();
                (*name, count)
            })
            .collect();

        Self {
            total_rows: records.len(),
            head: records.iter().take(HEAD_ROWS).cloned().collect(),
            missing,
            duplicate_rows: duplicate_count(records),
        }
    }

    pub fn missing_total(&self) -> usize {
        self.missing.iter().map(|(_, n)| n).sum()
    }

    pub fn print(&self) {
        info!(
            rows = self.total_rows,
            missing = self.missing_total(),
            duplicates = self.duplicate_rows,
            "Source profile"
        );

        println!("=== First {} rows ===", self.head.len());
        println!("{}", SOURCE_COLUMNS.join(" | "));
        for rec in &self.head {
            let cells: Vec<&str> = rec.values.iter().map(|v| v.as_deref().unwrap_or("<missing>")).collect();
            println!("{}", cells.join(" | "));
        }
        println!();

        println!("=== Rows: {} ===\n", self.total_rows);

        println!("=== Missing values per column ===");
        for (name, count) in &self.missing {
            println!("{name:<15} {count}");
        }
        println!();

        println!("=== Duplicate rows ===");
        println!("{}\n", self.duplicate_rows);
    }
}

/// Grouped aggregates over the cleaned records.
#[derive(Debug, Clone, Default)]
pub struct CleanedSummary {
    pub sales_by_year: BTreeMap<i32, f64>,
    pub top_products_by_quantity: Vec<(String, i64)>,
    pub profit_by_category: BTreeMap<String, f64>,
    pub top_countries_by_sales: Vec<(String, f64)>,
}

impl CleanedSummary {
    pub fn of(records: &[CleanedRecord]) -> Self {
        let mut summary = Self::default();
        let mut quantity_by_product: HashMap<String, i64> = HashMap::new();
        let mut sales_by_country: HashMap<String, f64> = HashMap::new();

        for rec in records {
            *summary.sales_by_year.entry(rec.year).or_default() += rec.sales;
            *summary
                .profit_by_category
                .entry(rec.category.clone())
                .or_default() += rec.profit;
            *quantity_by_product
                .entry(rec.product_name.clone())
                .or_default() += rec.quantity;
            *sales_by_country.entry(rec.country.clone()).or_default() += rec.sales;
        }

        summary.top_products_by_quantity = top_n(quantity_by_product, TOP_N);
        summary.top_countries_by_sales = top_n(sales_by_country, TOP_N);
        summary
    }

    pub fn print(&self) {
        println!("=== Total sales per year ===");
        for (year, sales) in &self.sales_by_year {
            println!("{year}  {sales:.2}");
        }
        println!();

        println!("=== Top {TOP_N} products by quantity ===");
        for (product, qty) in &self.top_products_by_quantity {
            println!("{qty:>6}  {product}");
        }
        println!();

        println!("=== Profit per category ===");
        for (category, profit) in &self.profit_by_category {
            println!("{category:<20} {profit:.2}");
        }
        println!();

        println!("=== Countries by sales ===");
        for (country, sales) in &self.top_countries_by_sales {
            println!("{country:<20} {sales:.2}");
        }
        println!();
    }
}

/// Largest `n` entries by value, ties broken by key so output is stable.
pub fn top_n<K, V>(map: HashMap<K, V>, n: usize) -> Vec<(K, V)>
where
    K: Ord + Hash,
    V: PartialOrd + Copy,
{
    let mut entries: Vec<(K, V)> = map.into_iter().collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(line: u64, values: &[Option<&str>]) -> RawRecord {
        let mut values: Vec<Option<String>> = values.iter().map(|v| v.map(str::to_string)).collect();
        values.resize(SOURCE_COLUMNS.len(), Some("x".to_string()));
        RawRecord { line, values }
    }

    #[test]
    fn profile_counts_missing_and_duplicates() {
        let records = vec![
            raw(2, &[Some("1"), None]),
            raw(3, &[Some("1"), None]),
            raw(4, &[None, Some("B")]),
        ];
        let profile = SourceProfile::of(&records);
        assert_eq!(profile.total_rows, 3);
        assert_eq!(profile.duplicate_rows, 1);
        assert_eq!(profile.missing[0], ("Row ID", 1));
        assert_eq!(profile.missing[1], ("Order ID", 2));
        assert_eq!(profile.missing_total(), 3);
        assert_eq!(profile.head.len(), 3);
    }

    #[test]
    fn top_n_orders_by_value_then_key() {
        let map: HashMap<String, i64> = [("b", 5), ("a", 5), ("c", 9), ("d", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let top = top_n(map, 3);
        assert_eq!(
            top,
            vec![("c".to_string(), 9), ("a".to_string(), 5), ("b".to_string(), 5)]
        );
    }
}
