//! Chart generation from aggregated sales.
//!
//! This module turns a [`SalesSummary`] into renderer-neutral [`Chart`]
//! descriptions, derives output file names, and produces the JSON summary.

use crate::config::ChartConfig;
use crate::models::{
    LabeledValue, NamingMode, ProductCount, ProductRanking, ReportKind, SalesSummary,
};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// `strftime` pattern of the file-name timestamp suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Kind of chart a report is drawn as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Pie,
    StackedBar,
    Bar,
    LineOverlay,
    HorizontalBar,
    MultiPanelHorizontalBar,
}

/// How numeric labels are printed on bars and points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFormat {
    /// Whole counts.
    Integer,
    /// Two decimal places.
    Decimal,
    /// Two decimal places behind a currency prefix.
    Currency(String),
}

/// One named series of a stacked bar chart, aligned with its categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// One sub-chart of a multi-panel chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub bars: Vec<LabeledValue>,
}

/// Data drawn by a chart; the variant decides the chart kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartBody {
    Pie {
        slices: Vec<LabeledValue>,
    },
    StackedBar {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Bar {
        bars: Vec<LabeledValue>,
        overlay_line: bool,
        y_max: Option<f64>,
    },
    /// Bars are drawn bottom-up: the first bar sits at the bottom.
    HorizontalBar {
        bars: Vec<LabeledValue>,
    },
    Panels {
        panels: Vec<Panel>,
    },
}

/// A renderer-neutral chart description.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Report name used as the file-name stem.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub format: ValueFormat,
    pub body: ChartBody,
}

impl Chart {
    pub fn kind(&self) -> ChartKind {
        match &self.body {
            ChartBody::Pie { .. } => ChartKind::Pie,
            ChartBody::StackedBar { .. } => ChartKind::StackedBar,
            ChartBody::Bar {
                overlay_line: true, ..
            } => ChartKind::LineOverlay,
            ChartBody::Bar { .. } => ChartKind::Bar,
            ChartBody::HorizontalBar { .. } => ChartKind::HorizontalBar,
            ChartBody::Panels { .. } => ChartKind::MultiPanelHorizontalBar,
        }
    }

    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        match &self.body {
            ChartBody::Pie { slices } => slices.iter().all(|s| s.value <= 0.0),
            ChartBody::StackedBar { categories, .. } => categories.is_empty(),
            ChartBody::Bar { bars, .. } | ChartBody::HorizontalBar { bars } => bars.is_empty(),
            ChartBody::Panels { panels } => panels.is_empty(),
        }
    }
}

/// Format a bar or point label.
pub fn format_value(value: f64, format: &ValueFormat) -> String {
    match format {
        ValueFormat::Integer => format!("{}", value.round() as i64),
        ValueFormat::Decimal => format!("{:.2}", value),
        ValueFormat::Currency(prefix) => format!("{}{:.2}", prefix, value),
    }
}

/// Format a pie slice share given in percent.
pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

/// Lowercase, underscore-separated form of the brand for file names.
pub fn brand_slug(brand: &str) -> String {
    brand
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Render the run timestamp the way it appears in file names.
pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// File name of a chart, e.g. `revenue_by_store_alura_store_2024-01-31_23-59-00.png`.
pub fn output_file_name(name: &str, brand: &str, naming: NamingMode, timestamp: &str) -> String {
    let mut stem = name.to_string();

    let slug = brand_slug(brand);
    if !slug.is_empty() {
        stem.push('_');
        stem.push_str(&slug);
    }

    if naming == NamingMode::Timestamped {
        stem.push('_');
        stem.push_str(timestamp);
    }

    format!("{}.png", stem)
}

/// Build the charts of one report.
///
/// Every report yields one chart except products, which yields the
/// best-sellers and the worst-sellers charts.
pub fn charts_for(
    report: ReportKind,
    summary: &SalesSummary,
    config: &ChartConfig,
    top_n: usize,
) -> Vec<Chart> {
    match report {
        ReportKind::Revenue => vec![revenue_chart(summary, config)],
        ReportKind::Categories => vec![category_chart(summary, config)],
        ReportKind::Ratings => vec![rating_chart(summary, config)],
        ReportKind::Shipping => vec![shipping_chart(summary, config)],
        ReportKind::Products => product_charts(summary, config, top_n),
    }
}

fn titled(title: &str, config: &ChartConfig) -> String {
    if config.brand.trim().is_empty() {
        title.to_string()
    } else {
        format!("{} ({})", title, config.brand)
    }
}

fn revenue_chart(summary: &SalesSummary, config: &ChartConfig) -> Chart {
    Chart {
        name: "revenue_by_store".to_string(),
        title: titled("Total Revenue by Store", config),
        x_label: String::new(),
        y_label: String::new(),
        format: ValueFormat::Currency(config.currency_prefix.clone()),
        body: ChartBody::Pie {
            slices: summary.revenue.clone(),
        },
    }
}

fn category_chart(summary: &SalesSummary, config: &ChartConfig) -> Chart {
    let matrix = &summary.categories;
    let series = matrix
        .stores
        .iter()
        .enumerate()
        .map(|(i, store)| Series {
            name: store.clone(),
            values: matrix
                .store_column(i)
                .into_iter()
                .map(|count| count as f64)
                .collect(),
        })
        .collect();

    Chart {
        name: "sales_by_category".to_string(),
        title: titled("Sales by Category per Store", config),
        x_label: "Product Category".to_string(),
        y_label: "Units Sold".to_string(),
        format: ValueFormat::Integer,
        body: ChartBody::StackedBar {
            categories: matrix.categories.clone(),
            series,
        },
    }
}

fn rating_chart(summary: &SalesSummary, config: &ChartConfig) -> Chart {
    Chart {
        name: "ratings_by_store".to_string(),
        title: titled("Average Customer Rating by Store", config),
        x_label: "Store".to_string(),
        y_label: "Average Rating (1 to 5)".to_string(),
        format: ValueFormat::Decimal,
        body: ChartBody::Bar {
            bars: summary.ratings.clone(),
            overlay_line: true,
            y_max: Some(5.5),
        },
    }
}

fn shipping_chart(summary: &SalesSummary, config: &ChartConfig) -> Chart {
    Chart {
        name: "shipping_by_store".to_string(),
        title: titled("Average Shipping Cost by Store", config),
        x_label: format!("Average Shipping Cost ({})", config.currency_prefix.trim()),
        y_label: "Store".to_string(),
        format: ValueFormat::Currency(config.currency_prefix.clone()),
        body: ChartBody::HorizontalBar {
            bars: summary.shipping.clone(),
        },
    }
}

fn product_charts(summary: &SalesSummary, config: &ChartConfig, top_n: usize) -> Vec<Chart> {
    vec![
        Chart {
            name: format!("top_{}_products", top_n),
            title: titled(&format!("Top {} Best-Selling Products by Store", top_n), config),
            x_label: "Units Sold".to_string(),
            y_label: String::new(),
            format: ValueFormat::Integer,
            body: ChartBody::Panels {
                panels: ranking_panels(summary, |r| r.top.as_slice()),
            },
        },
        Chart {
            name: format!("bottom_{}_products", top_n),
            title: titled(&format!("Top {} Least-Selling Products by Store", top_n), config),
            x_label: "Units Sold".to_string(),
            y_label: String::new(),
            format: ValueFormat::Integer,
            body: ChartBody::Panels {
                panels: ranking_panels(summary, |r| r.bottom.as_slice()),
            },
        },
    ]
}

// Reversed so the best seller of `top` and the worst seller of `bottom`
// end up on the top row of each panel.
fn ranking_panels<F>(summary: &SalesSummary, select: F) -> Vec<Panel>
where
    F: Fn(&ProductRanking) -> &[ProductCount],
{
    summary
        .products
        .iter()
        .map(|ranking| Panel {
            title: ranking.store.clone(),
            bars: select(ranking)
                .iter()
                .rev()
                .map(|p| LabeledValue::new(p.product.clone(), p.count as f64))
                .collect(),
        })
        .collect()
}

/// JSON document written next to the charts.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub stores: Vec<String>,
    pub charts: Vec<String>,
    pub summary: &'a SalesSummary,
}

/// Generate the JSON summary of a run.
pub fn generate_json_summary(document: &SummaryDocument<'_>) -> Result<String> {
    serde_json::to_string_pretty(document).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryMatrix;

    fn count(product: &str, count: usize) -> ProductCount {
        ProductCount {
            product: product.to_string(),
            count,
        }
    }

    fn create_test_summary() -> SalesSummary {
        SalesSummary {
            record_count: 3,
            grand_total: 35.0,
            revenue: vec![LabeledValue::new("A", 30.0), LabeledValue::new("B", 5.0)],
            categories: CategoryMatrix {
                categories: vec!["X".to_string(), "Y".to_string()],
                stores: vec!["A".to_string(), "B".to_string()],
                counts: vec![vec![1, 1], vec![1, 0]],
            },
            ratings: vec![LabeledValue::new("A", 4.5), LabeledValue::new("B", 3.0)],
            shipping: vec![LabeledValue::new("A", 2.0), LabeledValue::new("B", 0.5)],
            products: vec![ProductRanking {
                store: "A".to_string(),
                top: vec![count("Bola", 3), count("Cadeira", 1)],
                bottom: vec![count("Cadeira", 1), count("Bola", 3)],
                distinct_products: 2,
            }],
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(4.256, &ValueFormat::Decimal), "4.26");
        assert_eq!(format_value(3.0, &ValueFormat::Integer), "3");
        assert_eq!(
            format_value(12.5, &ValueFormat::Currency("R$ ".to_string())),
            "R$ 12.50"
        );
        assert_eq!(format_percent(85.714), "85.7%");
    }

    #[test]
    fn test_brand_slug() {
        assert_eq!(brand_slug("Alura Store"), "alura_store");
        assert_eq!(brand_slug("  Shop & Co. "), "shop_co");
        assert_eq!(brand_slug(""), "");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("revenue_by_store", "Alura Store", NamingMode::Fixed, "ignored"),
            "revenue_by_store_alura_store.png"
        );
        assert_eq!(
            output_file_name(
                "top_5_products",
                "",
                NamingMode::Timestamped,
                "2024-01-31_23-59-00"
            ),
            "top_5_products_2024-01-31_23-59-00.png"
        );
    }

    #[test]
    fn test_timestamp_is_sortable_to_the_second() {
        let time = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 7).unwrap();
        assert_eq!(format_timestamp(&time), "2024-01-31_23-59-07");
    }

    #[test]
    fn test_chart_kinds_per_report() {
        let summary = create_test_summary();
        let config = ChartConfig::default();

        let kinds: Vec<_> = ReportKind::ALL
            .iter()
            .flat_map(|report| charts_for(*report, &summary, &config, 5))
            .map(|chart| chart.kind())
            .collect();

        assert_eq!(
            kinds,
            vec![
                ChartKind::Pie,
                ChartKind::StackedBar,
                ChartKind::LineOverlay,
                ChartKind::HorizontalBar,
                ChartKind::MultiPanelHorizontalBar,
                ChartKind::MultiPanelHorizontalBar,
            ]
        );
    }

    #[test]
    fn test_category_chart_series_per_store() {
        let summary = create_test_summary();
        let chart = &charts_for(ReportKind::Categories, &summary, &ChartConfig::default(), 5)[0];

        match &chart.body {
            ChartBody::StackedBar { categories, series } => {
                assert_eq!(categories, &vec!["X".to_string(), "Y".to_string()]);
                assert_eq!(series[0].name, "A");
                assert_eq!(series[0].values, vec![1.0, 1.0]);
                assert_eq!(series[1].values, vec![1.0, 0.0]);
            }
            other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(chart.title, "Sales by Category per Store (Alura Store)");
    }

    #[test]
    fn test_product_panels_are_reversed_for_display() {
        let summary = create_test_summary();
        let charts = charts_for(ReportKind::Products, &summary, &ChartConfig::default(), 5);

        assert_eq!(charts[0].name, "top_5_products");
        assert_eq!(charts[1].name, "bottom_5_products");
        match &charts[0].body {
            ChartBody::Panels { panels } => {
                assert_eq!(panels[0].title, "A");
                assert_eq!(panels[0].bars.last().map(|b| b.label.as_str()), Some("Bola"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_empty_chart_detection() {
        let mut summary = create_test_summary();
        for store in summary.revenue.iter_mut() {
            store.value = 0.0;
        }
        let chart = &charts_for(ReportKind::Revenue, &summary, &ChartConfig::default(), 5)[0];
        assert!(chart.is_empty());

        summary.revenue.clear();
        let chart = &charts_for(ReportKind::Revenue, &summary, &ChartConfig::default(), 5)[0];
        assert!(chart.is_empty());
    }

    #[test]
    fn test_generate_json_summary() {
        let summary = create_test_summary();
        let document = SummaryDocument {
            generated_at: Utc::now(),
            stores: vec!["A".to_string(), "B".to_string()],
            charts: vec!["revenue_by_store.png".to_string()],
            summary: &summary,
        };

        let json = generate_json_summary(&document).unwrap();
        assert!(json.contains("\"grand_total\": 35.0"));
        assert!(json.contains("\"revenue\""));
        assert!(json.contains("\"distinct_products\": 2"));
    }
}
