//! Sales aggregation and statistics.
//!
//! This module computes the grouped summaries behind every report: sums,
//! means and counts per store, the category/store matrix, and the per-store
//! product rankings. Grouping keys iterate in ascending order and every sort
//! is stable, so ties always fall back to alphabetical order.

use crate::config::Config;
use crate::models::{
    CategoryMatrix, LabeledValue, ProductCount, ProductRanking, Record, SalesSummary, SalesTable,
    SortOrder,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Total price over every record.
pub fn grand_total(table: &SalesTable) -> f64 {
    table.iter().map(|r| r.price).sum()
}

/// Sum of prices per store.
pub fn revenue_by_store(table: &SalesTable, order: SortOrder) -> Vec<LabeledValue> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();

    for record in table.iter() {
        *totals.entry(record.store.as_str()).or_default() += record.price;
    }

    let mut values: Vec<_> = totals
        .into_iter()
        .map(|(store, total)| LabeledValue::new(store, total))
        .collect();
    sort_values(&mut values, order);
    values
}

/// Number of sales per category and store, zero-filled.
pub fn units_by_category(table: &SalesTable) -> CategoryMatrix {
    let stores = table.stores();
    let mut grouped: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();

    for record in table.iter() {
        *grouped
            .entry(record.category.as_str())
            .or_default()
            .entry(record.store.as_str())
            .or_default() += 1;
    }

    let categories: Vec<String> = grouped.keys().map(|c| c.to_string()).collect();
    let counts = grouped
        .values()
        .map(|per_store| {
            stores
                .iter()
                .map(|store| per_store.get(store.as_str()).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    CategoryMatrix {
        categories,
        stores,
        counts,
    }
}

/// Mean customer rating per store.
pub fn mean_rating_by_store(table: &SalesTable, order: SortOrder) -> Vec<LabeledValue> {
    let mut values = mean_by_store(table, |r| r.rating);
    sort_values(&mut values, order);
    values
}

/// Mean shipping cost per store, highest first.
pub fn mean_shipping_by_store(table: &SalesTable) -> Vec<LabeledValue> {
    let mut values = mean_by_store(table, |r| r.shipping);
    sort_values(&mut values, SortOrder::Descending);
    values
}

/// The `n` best and worst selling products of every store.
///
/// Products are considered in name order within a store; both selections
/// are stable, so equal counts keep that order and nothing is dropped or
/// duplicated at the cut.
pub fn product_rankings(table: &SalesTable, n: usize) -> Vec<ProductRanking> {
    let mut grouped: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();

    for record in table.iter() {
        *grouped
            .entry(record.store.as_str())
            .or_default()
            .entry(record.product.as_str())
            .or_default() += 1;
    }

    grouped
        .into_iter()
        .map(|(store, products)| {
            let counts: Vec<ProductCount> = products
                .into_iter()
                .map(|(product, count)| ProductCount {
                    product: product.to_string(),
                    count,
                })
                .collect();

            let mut top = counts.clone();
            top.sort_by_key(|p| std::cmp::Reverse(p.count));
            top.truncate(n);

            let mut bottom = counts.clone();
            bottom.sort_by_key(|p| p.count);
            bottom.truncate(n);

            ProductRanking {
                store: store.to_string(),
                top,
                bottom,
                distinct_products: counts.len(),
            }
        })
        .collect()
}

/// Compute every aggregation the reports need.
pub fn summarize(table: &SalesTable, config: &Config) -> SalesSummary {
    SalesSummary {
        record_count: table.len(),
        grand_total: grand_total(table),
        revenue: revenue_by_store(table, config.chart.revenue_order),
        categories: units_by_category(table),
        ratings: mean_rating_by_store(table, config.chart.rating_order),
        shipping: mean_shipping_by_store(table),
        products: product_rankings(table, config.general.top_n),
    }
}

fn mean_by_store<F>(table: &SalesTable, field: F) -> Vec<LabeledValue>
where
    F: Fn(&Record) -> f64,
{
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

    for record in table.iter() {
        let entry = sums.entry(record.store.as_str()).or_default();
        entry.0 += field(record);
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(store, (sum, count))| LabeledValue::new(store, sum / count as f64))
        .collect()
}

fn sort_values(values: &mut [LabeledValue], order: SortOrder) {
    match order {
        SortOrder::Key => {}
        SortOrder::Descending => {
            values.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal))
        }
        SortOrder::Ascending => {
            values.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal))
        }
    }
}
