//! Data models for the sales reporting pipeline.
//!
//! This module contains the core data structures shared by the loader,
//! the aggregator and the chart generator: sale records, the unified
//! table, and the summaries computed from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single sale line read from a store's input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Sale price.
    pub price: f64,
    /// Product category.
    pub category: String,
    /// Customer rating (1 to 5).
    pub rating: f64,
    /// Shipping cost paid for the sale.
    pub shipping: f64,
    /// Product name.
    pub product: String,
    /// Display name of the store the record was loaded from.
    pub store: String,
}

/// The unified table of records from every loaded source.
///
/// Sources appear in configuration order and rows keep their file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesTable {
    records: Vec<Record>,
}

impl SalesTable {
    /// Creates a table from already-tagged records.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Appends the records of one source.
    pub fn extend(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Distinct store names in ascending order.
    pub fn stores(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.store.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A label with its aggregated value (e.g. store and total revenue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: f64,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Unit counts per category (rows) and store (columns), zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMatrix {
    /// Category names, ascending.
    pub categories: Vec<String>,
    /// Store names, ascending.
    pub stores: Vec<String>,
    /// `counts[category_index][store_index]`.
    pub counts: Vec<Vec<usize>>,
}

impl CategoryMatrix {
    /// Returns the count for a category/store pair, if both exist.
    pub fn get(&self, category: &str, store: &str) -> Option<usize> {
        let row = self.categories.iter().position(|c| c == category)?;
        let col = self.stores.iter().position(|s| s == store)?;
        Some(self.counts[row][col])
    }

    /// Returns the column of counts for one store, in category order.
    pub fn store_column(&self, store_index: usize) -> Vec<usize> {
        self.counts.iter().map(|row| row[store_index]).collect()
    }
}

/// Number of sales of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCount {
    pub product: String,
    pub count: usize,
}

/// Best and worst selling products of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRanking {
    /// Store display name.
    pub store: String,
    /// Largest counts, largest first.
    pub top: Vec<ProductCount>,
    /// Smallest counts, smallest first.
    pub bottom: Vec<ProductCount>,
    /// Number of distinct products sold by the store.
    pub distinct_products: usize,
}

/// Every aggregation of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Number of records aggregated.
    pub record_count: usize,
    /// Total price over every record.
    pub grand_total: f64,
    /// Revenue per store.
    pub revenue: Vec<LabeledValue>,
    /// Units sold per category and store.
    pub categories: CategoryMatrix,
    /// Mean customer rating per store.
    pub ratings: Vec<LabeledValue>,
    /// Mean shipping cost per store, highest first.
    pub shipping: Vec<LabeledValue>,
    /// Top/bottom products per store.
    pub products: Vec<ProductRanking>,
}

/// Order applied to a per-store series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending key (store name) order.
    #[default]
    Key,
    /// Highest value first.
    Descending,
    /// Lowest value first.
    Ascending,
}

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// `<report>_<brand>.png`, overwritten on every run.
    Fixed,
    /// `<report>_<brand>_<YYYY-MM-DD_HH-MM-SS>.png`.
    #[default]
    Timestamped,
}

/// What happens to the remaining reports when one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failing report.
    #[default]
    Abort,
    /// Record the failure and keep going.
    Continue,
}

/// The fixed set of reports, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Revenue,
    Categories,
    Ratings,
    Shipping,
    Products,
}

impl ReportKind {
    /// Reports in the order the pipeline runs them.
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Revenue,
        ReportKind::Categories,
        ReportKind::Ratings,
        ReportKind::Shipping,
        ReportKind::Products,
    ];
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Revenue => write!(f, "revenue"),
            ReportKind::Categories => write!(f, "categories"),
            ReportKind::Ratings => write!(f, "ratings"),
            ReportKind::Shipping => write!(f, "shipping"),
            ReportKind::Products => write!(f, "products"),
        }
    }
}
