//! Chart rendering.
//!
//! [`ChartRenderer`] is the seam between the pipeline and the drawing
//! backend. [`PlottersRenderer`] draws PNG images with plotters.

use crate::config::ChartConfig;
use crate::models::LabeledValue;
use crate::report::generator::{
    format_percent, format_value, Chart, ChartBody, Panel, Series, ValueFormat,
};
use anyhow::{bail, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, PI};
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Draws a chart and writes it to `path`, creating or overwriting the file.
pub trait ChartRenderer {
    fn render(&mut self, chart: &Chart, path: &Path) -> Result<()>;
}

/// Parse a `#RRGGBB` color.
pub fn parse_hex_color(hex: &str) -> Result<RGBColor> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid color '{}': expected #RRGGBB", hex);
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
    Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Angular extent of one pie slice, in radians, counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub percent: f64,
}

/// Lay out pie slices starting at twelve o'clock.
///
/// Non-positive values get no slice; an all-zero series yields no slices.
pub fn pie_slices(values: &[LabeledValue]) -> Vec<PieSlice> {
    let total: f64 = values.iter().map(|v| v.value.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut angle = FRAC_PI_2;
    values
        .iter()
        .filter(|v| v.value > 0.0)
        .map(|v| {
            let share = v.value / total;
            let start = angle;
            angle += share * 2.0 * PI;
            PieSlice {
                label: v.label.clone(),
                start,
                end: angle,
                percent: share * 100.0,
            }
        })
        .collect()
}

/// Rows and columns of a grid holding `panels` sub-charts.
pub fn panel_grid(panels: usize) -> (usize, usize) {
    if panels == 0 {
        return (1, 1);
    }
    let cols = (panels as f64).sqrt().ceil() as usize;
    let rows = panels.div_ceil(cols);
    (rows, cols)
}

/// Discrete axis range that gives each of `bars` bars one segment.
///
/// A `u32` range includes its end, so `0..n - 1` holds `n` values. A
/// one-value range maps every coordinate to the same pixel, so a lone bar
/// keeps a second, empty segment.
pub fn bar_slots(bars: usize) -> Range<u32> {
    0..(bars.max(2) - 1) as u32
}

/// Tick label of a value axis. Count axes still get fractional ticks.
pub fn axis_label(value: f64, format: &ValueFormat) -> String {
    match format {
        ValueFormat::Integer if (value - value.round()).abs() > 1e-9 => format!("{:.1}", value),
        _ => format_value(value, format),
    }
}

/// PNG renderer backed by plotters.
pub struct PlottersRenderer {
    palette: Vec<RGBColor>,
    size: (u32, u32),
}

impl PlottersRenderer {
    pub fn new(config: &ChartConfig) -> Result<Self> {
        let palette = config
            .palette
            .iter()
            .map(|c| parse_hex_color(c))
            .collect::<Result<Vec<_>>>()?;
        if palette.is_empty() {
            bail!("Chart palette must contain at least one color");
        }

        Ok(Self {
            palette,
            size: (config.width, config.height),
        })
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(&mut self, chart: &Chart, path: &Path) -> Result<()> {
        debug!("Rendering {:?} chart to {}", chart.kind(), path.display());

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let area = root.titled(&chart.title, ("sans-serif", 28))?;

        if chart.is_empty() {
            draw_no_data(&area)?;
        } else {
            match &chart.body {
                ChartBody::Pie { slices } => draw_pie(&area, slices, &self.palette)?,
                ChartBody::StackedBar { categories, series } => {
                    draw_stacked_bars(&area, chart, categories, series, &self.palette)?
                }
                ChartBody::Bar {
                    bars,
                    overlay_line,
                    y_max,
                } => draw_bars(&area, chart, bars, *overlay_line, *y_max, &self.palette)?,
                ChartBody::HorizontalBar { bars } => {
                    draw_horizontal_bars(&area, None, chart, bars, &self.palette)?
                }
                ChartBody::Panels { panels } => draw_panels(&area, chart, panels, &self.palette)?,
            }
        }

        root.present()
            .with_context(|| format!("Failed to write chart: {}", path.display()))?;
        Ok(())
    }
}

fn color_at(palette: &[RGBColor], index: usize) -> RGBColor {
    palette[index % palette.len()]
}

fn label_style(size: u32, pos: Pos) -> TextStyle<'static> {
    ("sans-serif", size).into_font().color(&BLACK).pos(pos)
}

fn centered() -> Pos {
    Pos::new(HPos::Center, VPos::Center)
}

fn segment_label(value: &SegmentValue<u32>, labels: &[String]) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

fn draw_no_data<DB>(area: &DrawingArea<DB, Shift>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        "No data",
        ((w / 2) as i32, (h / 2) as i32),
        label_style(24, centered()),
    ))?;
    Ok(())
}

fn draw_pie<DB>(
    area: &DrawingArea<DB, Shift>,
    values: &[LabeledValue],
    palette: &[RGBColor],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.36;

    let polar = |r: f64, angle: f64| {
        (
            center.0 + (r * angle.cos()).round() as i32,
            center.1 - (r * angle.sin()).round() as i32,
        )
    };

    for (i, slice) in pie_slices(values).iter().enumerate() {
        let steps = ((slice.end - slice.start) / (PI / 90.0)).ceil().max(1.0) as usize;
        let mut points = vec![center];
        for step in 0..=steps {
            let angle = slice.start + (slice.end - slice.start) * step as f64 / steps as f64;
            points.push(polar(radius, angle));
        }
        area.draw(&Polygon::new(points, color_at(palette, i).filled()))?;

        let mid = (slice.start + slice.end) / 2.0;
        area.draw(&Text::new(
            format_percent(slice.percent),
            polar(radius * 0.6, mid),
            label_style(16, centered()),
        ))?;

        let h_pos = if mid.cos() >= 0.0 { HPos::Left } else { HPos::Right };
        area.draw(&Text::new(
            slice.label.clone(),
            polar(radius * 1.08, mid),
            label_style(16, Pos::new(h_pos, VPos::Center)),
        ))?;
    }

    Ok(())
}

fn draw_stacked_bars<DB>(
    area: &DrawingArea<DB, Shift>,
    chart: &Chart,
    categories: &[String],
    series: &[Series],
    palette: &[RGBColor],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let totals: Vec<f64> = (0..categories.len())
        .map(|ci| series.iter().map(|s| s.values.get(ci).copied().unwrap_or(0.0)).sum())
        .collect();
    let y_max = totals.iter().copied().fold(1.0, f64::max) * 1.1;

    let mut ctx = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(bar_slots(categories.len()).into_segmented(), 0f64..y_max)?;

    let x_fmt = |v: &SegmentValue<u32>| segment_label(v, categories);
    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len())
        .x_label_formatter(&x_fmt)
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()?;

    let mut base = vec![0.0; categories.len()];
    for (si, s) in series.iter().enumerate() {
        let color = color_at(palette, si);

        let bars: Vec<_> = (0..categories.len())
            .map(|ci| {
                let value = s.values.get(ci).copied().unwrap_or(0.0);
                let x = ci as u32;
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(x), base[ci]),
                        (SegmentValue::Exact(x + 1), base[ci] + value),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 10, 10);
                bar
            })
            .collect();
        ctx.draw_series(bars)?
            .label(s.name.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));

        let labels: Vec<_> = (0..categories.len())
            .filter_map(|ci| {
                let value = s.values.get(ci).copied().unwrap_or(0.0);
                (value > 0.0).then(|| {
                    Text::new(
                        format_value(value, &chart.format),
                        (SegmentValue::CenterOf(ci as u32), base[ci] + value / 2.0),
                        label_style(12, centered()),
                    )
                })
            })
            .collect();
        ctx.draw_series(labels)?;

        for (ci, slot) in base.iter_mut().enumerate() {
            *slot += s.values.get(ci).copied().unwrap_or(0.0);
        }
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

fn draw_bars<DB>(
    area: &DrawingArea<DB, Shift>,
    chart: &Chart,
    bars: &[LabeledValue],
    overlay_line: bool,
    y_max: Option<f64>,
    palette: &[RGBColor],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
    let y_max = y_max.unwrap_or_else(|| bars.iter().map(|b| b.value).fold(1.0, f64::max) * 1.15);
    let offset = y_max * 0.02;

    let mut ctx = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(bar_slots(bars.len()).into_segmented(), 0f64..y_max)?;

    let x_fmt = |v: &SegmentValue<u32>| segment_label(v, &labels);
    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&x_fmt)
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()?;

    let bar_color = color_at(palette, 1).mix(0.7);
    ctx.draw_series(bars.iter().enumerate().map(|(i, b)| {
        let x = i as u32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), b.value)],
            bar_color.filled(),
        );
        bar.set_margin(0, 0, 20, 20);
        bar
    }))?
    .label("Average (bars)")
    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], bar_color.filled()));

    ctx.draw_series(bars.iter().enumerate().map(|(i, b)| {
        Text::new(
            format_value(b.value, &chart.format),
            (SegmentValue::CenterOf(i as u32), b.value + offset),
            label_style(14, Pos::new(HPos::Center, VPos::Bottom)),
        )
    }))?;

    if overlay_line {
        let line_color = color_at(palette, 0);
        let points: Vec<_> = bars
            .iter()
            .enumerate()
            .map(|(i, b)| (SegmentValue::CenterOf(i as u32), b.value))
            .collect();

        ctx.draw_series(LineSeries::new(points.clone(), line_color.stroke_width(2)))?
            .label("Average (line)")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &line_color));
        ctx.draw_series(
            points
                .iter()
                .map(|point| Circle::new(point.clone(), 5, line_color.filled())),
        )?;
        ctx.draw_series(points.iter().zip(bars).map(|(point, b)| {
            Text::new(
                format_value(b.value, &chart.format),
                (point.0.clone(), b.value - offset * 2.0),
                ("sans-serif", 14)
                    .into_font()
                    .color(&line_color)
                    .pos(Pos::new(HPos::Center, VPos::Top)),
            )
        }))?;
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

fn draw_horizontal_bars<DB>(
    area: &DrawingArea<DB, Shift>,
    caption: Option<&str>,
    chart: &Chart,
    bars: &[LabeledValue],
    palette: &[RGBColor],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
    let x_max = bars.iter().map(|b| b.value).fold(1.0, f64::max) * 1.25;

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(200);
    if let Some(caption) = caption {
        builder.caption(caption, ("sans-serif", 18));
    }
    let mut ctx =
        builder.build_cartesian_2d(0f64..x_max, bar_slots(bars.len()).into_segmented())?;

    let x_fmt = |v: &f64| axis_label(*v, &chart.format);
    let y_fmt = |v: &SegmentValue<u32>| segment_label(v, &labels);
    ctx.configure_mesh()
        .disable_y_mesh()
        .y_labels(bars.len())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()?;

    ctx.draw_series(bars.iter().enumerate().map(|(i, b)| {
        let y = i as u32;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(y)), (b.value, SegmentValue::Exact(y + 1))],
            color_at(palette, i).filled(),
        );
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;

    ctx.draw_series(bars.iter().enumerate().map(|(i, b)| {
        Text::new(
            format_value(b.value, &chart.format),
            (b.value + x_max * 0.01, SegmentValue::CenterOf(i as u32)),
            label_style(13, Pos::new(HPos::Left, VPos::Center)),
        )
    }))?;

    Ok(())
}

fn draw_panels<DB>(
    area: &DrawingArea<DB, Shift>,
    chart: &Chart,
    panels: &[Panel],
    palette: &[RGBColor],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let cells = area.split_evenly(panel_grid(panels.len()));
    for (panel, cell) in panels.iter().zip(cells.iter()) {
        if panel.bars.is_empty() {
            continue;
        }
        draw_horizontal_bars(cell, Some(&panel.title), chart, &panel.bars, palette)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::summarize;
    use crate::config::Config;
    use crate::models::{Record, ReportKind, SalesTable};
    use crate::report::charts_for;
    use tempfile::TempDir;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#F2E205").unwrap(), RGBColor(0xF2, 0xE2, 0x05));
        assert_eq!(parse_hex_color("0d0d0d").unwrap(), RGBColor(13, 13, 13));
        assert!(parse_hex_color("#F2E2").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
    }

    #[test]
    fn test_pie_slices_cover_full_circle() {
        let values = vec![
            LabeledValue::new("A", 30.0),
            LabeledValue::new("B", 10.0),
            LabeledValue::new("C", 0.0),
        ];
        let slices = pie_slices(&values);

        assert_eq!(slices.len(), 2);
        assert!((slices[0].start - FRAC_PI_2).abs() < 1e-12);
        assert!((slices[1].end - (FRAC_PI_2 + 2.0 * PI)).abs() < 1e-9);
        assert!((slices[0].percent - 75.0).abs() < 1e-9);
        assert_eq!(format_percent(slices[1].percent), "25.0%");
    }

    #[test]
    fn test_pie_slices_all_zero() {
        assert!(pie_slices(&[LabeledValue::new("A", 0.0)]).is_empty());
    }

    #[test]
    fn test_panel_grid() {
        assert_eq!(panel_grid(0), (1, 1));
        assert_eq!(panel_grid(1), (1, 1));
        assert_eq!(panel_grid(3), (2, 2));
        assert_eq!(panel_grid(4), (2, 2));
        assert_eq!(panel_grid(5), (2, 3));
    }

    #[test]
    fn test_bar_slots_fill_the_axis() {
        assert_eq!(bar_slots(4), 0..3);

        let axis = bar_slots(4).into_segmented();
        assert_eq!(axis.map(&SegmentValue::Exact(0), (0, 400)), 0);
        assert_eq!(axis.map(&SegmentValue::Exact(4), (0, 400)), 400);
        assert_eq!(axis.map(&SegmentValue::CenterOf(3), (0, 400)), 350);
    }

    #[test]
    fn test_bar_slots_single_bar_is_not_collapsed() {
        assert_eq!(bar_slots(1), 0..1);
        assert_eq!(bar_slots(0), 0..1);

        let axis = bar_slots(1).into_segmented();
        let left = axis.map(&SegmentValue::Exact(0), (0, 400));
        let right = axis.map(&SegmentValue::Exact(1), (0, 400));
        assert!(right - left > 0);
    }

    #[test]
    fn test_axis_label() {
        assert_eq!(axis_label(2.0, &ValueFormat::Integer), "2");
        assert_eq!(axis_label(0.5, &ValueFormat::Integer), "0.5");
        assert_eq!(axis_label(1.5, &ValueFormat::Decimal), "1.50");
        assert_eq!(
            axis_label(1.5, &ValueFormat::Currency("R$ ".to_string())),
            "R$ 1.50"
        );
    }

    #[test]
    fn test_plotters_renderer_writes_every_chart() {
        let stores = ["North", "South", "East"];
        let products = ["Bola", "Cadeira", "Lampada", "Mesa", "Sofa", "Tapete"];
        let categories = ["esporte", "moveis", "casa"];

        let mut records = Vec::new();
        for (si, store) in stores.iter().enumerate() {
            for i in 0..12 {
                records.push(Record {
                    price: 10.0 + (i * (si + 1)) as f64,
                    category: categories[i % categories.len()].to_string(),
                    rating: (1 + (i + si) % 5) as f64,
                    shipping: 1.0 + si as f64,
                    product: products[(i * i + si) % products.len()].to_string(),
                    store: store.to_string(),
                });
            }
        }
        let table = SalesTable::from_records(records);
        let config = Config::default();
        let summary = summarize(&table, &config);

        let dir = TempDir::new().unwrap();
        let mut renderer = PlottersRenderer::new(&config.chart).unwrap();
        let mut written = 0;
        for report in ReportKind::ALL {
            for chart in charts_for(report, &summary, &config.chart, 5) {
                let path = dir.path().join(format!("{}.png", chart.name));
                renderer.render(&chart, &path).unwrap();
                assert!(std::fs::metadata(&path).unwrap().len() > 0);
                written += 1;
            }
        }
        assert_eq!(written, 6);
    }

    #[test]
    fn test_renderer_rejects_empty_palette() {
        let mut config = ChartConfig::default();
        config.palette.clear();
        assert!(PlottersRenderer::new(&config).is_err());
    }
}
