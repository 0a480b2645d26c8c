//! SVG charts.
//!
//! Every function writes one file and returns once it has been flushed.
//! Callers skip charts for empty data; the drawing code assumes at least
//! one bar or point.

use crate::analysis::{CompartmentMass, LogDistribution, LogScatter, RatioScatter, Ranked};
use crate::report::declutter::{estimate_width, place_labels};
use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

/// Pixel size of a single panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

const BAR: RGBColor = RGBColor(70, 130, 180);
const LABEL: RGBColor = RGBColor(0, 128, 0);
const CAPTION_FONT: (&str, i32) = ("sans-serif", 20);
const LABEL_FONT_SIZE: i32 = 12;

/// Label text for the centre of a segment.
fn segment_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Data range with 5% padding on each side.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if lo == hi {
        return (lo - 0.5)..(hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn upper_bound(max: f64) -> f64 {
    if max > 0.0 && max.is_finite() {
        max * 1.1
    } else {
        1.0
    }
}

/// Vertical bars, one per ranked item, in the given order.
fn draw_bars(
    area: &DrawingArea<SVGBackend, Shift>,
    caption: &str,
    y_desc: &str,
    items: &[Ranked],
) -> Result<()> {
    let labels: Vec<String> = items.iter().map(|r| r.label.clone()).collect();
    let y_max = upper_bound(items.iter().map(|r| r.value).fold(0.0, f64::max));

    let mut chart = ChartBuilder::on(area)
        .caption(caption, CAPTION_FONT)
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d((0..items.len()).into_segmented(), 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(items.len())
        .x_label_formatter(&|v| segment_label(&labels, v))
        .y_desc(y_desc)
        .y_label_formatter(&|v| format!("{:.1e}", v))
        .draw()?;

    chart.draw_series(items.iter().enumerate().map(|(i, r)| {
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), r.value.max(0.0)),
            ],
            BAR.filled(),
        );
        bar.set_margin(0, 0, 4, 4);
        bar
    }))?;

    Ok(())
}

/// Top proteins of a compartment beside their cumulative mass curve.
pub fn compartment_chart(path: &Path, mass: &CompartmentMass, size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width * 2, size.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    draw_bars(
        &panels[0],
        &format!("Top {} proteins in {} ({})", mass.top.len(), mass.compartment, mass.condition),
        "Mass fraction",
        &mass.top,
    )?;

    let n = mass.curve.len();
    let y_max = upper_bound(mass.curve.last().map(|p| p.cumulative).unwrap_or(0.0));
    let mut chart = ChartBuilder::on(&panels[1])
        .caption(
            format!("Cumulative mass in {} ({})", mass.compartment, mass.condition),
            CAPTION_FONT,
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..(n as f64 + 1.0), 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Protein rank")
        .y_desc("Cumulative mass fraction")
        .y_label_formatter(&|v| format!("{:.1e}", v))
        .draw()?;

    let points: Vec<(f64, f64)> = mass
        .curve
        .iter()
        .enumerate()
        .map(|(i, p)| ((i + 1) as f64, p.cumulative))
        .collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), BAR.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, BAR.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Summed mass of the matched proteins per condition.
pub fn condition_totals_chart(path: &Path, query: &str, totals: &[Ranked], size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_bars(
        &root,
        &format!("Mass Fraction Distribution for '{}'", query),
        "Summed mass fraction",
        totals,
    )?;
    root.present()?;
    Ok(())
}

/// Horizontal ranking of compartments by mass ratio, largest on top.
pub fn ratio_ranking_chart(path: &Path, condition: &str, ranked: &[Ranked], size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = ranked.len();
    // Row 0 is drawn at the bottom, so reverse the ranking.
    let labels: Vec<String> = ranked.iter().rev().map(|r| r.label.clone()).collect();
    let x_max = upper_bound(ranked.iter().map(|r| r.value).fold(0.0, f64::max));

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Top compartments by mass ratio ({})", condition), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0.0..x_max, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Mass ratio")
        .draw()?;

    chart.draw_series(ranked.iter().enumerate().map(|(rank, r)| {
        let row = n - 1 - rank;
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(row)),
                (r.value.max(0.0), SegmentValue::Exact(row + 1)),
            ],
            BAR.filled(),
        );
        bar.set_margin(3, 3, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Ratio scatter of two conditions with a y = x reference line. Labelled
/// compartments get green text joined to their point by a grey leader.
pub fn ratio_scatter_chart(path: &Path, scatter: &RatioScatter, size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max = upper_bound(scatter.max_value);
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Compartment mass ratio: {} vs {}", scatter.first, scatter.second),
            CAPTION_FONT,
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max, 0.0..max)?;

    chart
        .configure_mesh()
        .x_desc(scatter.first.as_str())
        .y_desc(scatter.second.as_str())
        .draw()?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (scatter.max_value, scatter.max_value)],
        BLACK.mix(0.4),
    )))?;
    chart.draw_series(
        scatter
            .points
            .iter()
            .map(|p| Circle::new((p.x, p.y), 4, BAR.filled())),
    )?;

    let labelled: Vec<_> = scatter.labelled().collect();
    let anchors: Vec<(f64, f64)> = labelled
        .iter()
        .map(|p| {
            let (x, y) = chart.backend_coord(&(p.x, p.y));
            (x as f64, y as f64)
        })
        .collect();
    let sizes: Vec<(f64, f64)> = labelled
        .iter()
        .map(|p| {
            (
                estimate_width(&p.compartment, LABEL_FONT_SIZE as f64),
                LABEL_FONT_SIZE as f64,
            )
        })
        .collect();
    let (xs, ys) = chart.plotting_area().get_pixel_range();
    let bounds = (xs.start as f64, ys.start as f64, xs.end as f64, ys.end as f64);
    let boxes = place_labels(&anchors, &sizes, bounds);

    let style = ("sans-serif", LABEL_FONT_SIZE).into_font().color(&LABEL);
    for ((point, anchor), label) in labelled.iter().zip(&anchors).zip(&boxes) {
        let leader_end = (label.x as i32, (label.y + label.height / 2.0) as i32);
        root.draw(&PathElement::new(
            vec![(anchor.0 as i32, anchor.1 as i32), leader_end],
            BLACK.mix(0.4),
        ))?;
        root.draw(&Text::new(
            point.compartment.clone(),
            (label.x as i32, label.y as i32),
            style.clone(),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn draw_histogram(
    area: &DrawingArea<SVGBackend, Shift>,
    dist: &LogDistribution,
) -> Result<()> {
    let Some(hist) = dist.histogram.as_ref() else {
        return Ok(());
    };
    let x_range = padded_range(hist.edges.iter().copied());
    let density_max = dist.density.iter().map(|p| p.1).fold(0.0, f64::max);
    let y_max = upper_bound((hist.max_count() as f64).max(density_max));

    let mut chart = ChartBuilder::on(area)
        .caption(format!("log mass fraction ({})", dist.condition), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("ln(mass fraction)")
        .y_desc("Proteins")
        .draw()?;

    chart.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
        Rectangle::new(
            [(hist.edges[i], 0.0), (hist.edges[i + 1], count as f64)],
            BAR.mix(0.6).filled(),
        )
    }))?;
    chart.draw_series(LineSeries::new(dist.density.iter().copied(), RED.stroke_width(2)))?;

    Ok(())
}

/// Histogram of log mass fractions with a density curve.
pub fn distribution_chart(path: &Path, dist: &LogDistribution, size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_histogram(&root, dist)?;
    root.present()?;
    Ok(())
}

/// Log-log scatter with marginal histograms and the correlation.
pub fn log_scatter_chart(path: &Path, scatter: &LogScatter, size: ChartSize) -> Result<()> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let (top, bottom) = root.split_vertically((size.height / 4) as i32);
    let (main, right) = bottom.split_horizontally((size.width * 3 / 4) as i32);

    let x_range = padded_range(scatter.points.iter().map(|p| p.x));
    let y_range = padded_range(scatter.points.iter().map(|p| p.y));

    let mut chart = ChartBuilder::on(&main)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range.clone())?;

    chart
        .configure_mesh()
        .x_desc(format!("ln {}", scatter.first))
        .y_desc(format!("ln {}", scatter.second))
        .draw()?;

    chart.draw_series(
        scatter
            .points
            .iter()
            .map(|p| Circle::new((p.x, p.y), 2, BAR.mix(0.5).filled())),
    )?;

    let r_text = match scatter.correlation {
        Some(r) => format!("r = {:.3}", r),
        None => "r = n/a".to_string(),
    };
    let text_at = (
        x_range.start + (x_range.end - x_range.start) * 0.05,
        y_range.end - (y_range.end - y_range.start) * 0.05,
    );
    chart.draw_series(std::iter::once(Text::new(
        r_text,
        text_at,
        ("sans-serif", 16).into_font(),
    )))?;

    // Marginals are built from the plotted pairs and share their ranges.
    let first = &scatter.first_distribution;
    if let Some(hist) = first.histogram.as_ref() {
        let mut marginal = ChartBuilder::on(&top)
            .caption(
                format!("log mass fraction: {} vs {}", scatter.first, scatter.second),
                CAPTION_FONT,
            )
            .margin(10)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), 0.0..upper_bound(hist.max_count() as f64))?;
        marginal.configure_mesh().disable_mesh().draw()?;
        marginal.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
            Rectangle::new(
                [(hist.edges[i], 0.0), (hist.edges[i + 1], count as f64)],
                BAR.mix(0.6).filled(),
            )
        }))?;
        marginal.draw_series(LineSeries::new(first.density.iter().copied(), RED.stroke_width(2)))?;
    }

    let second = &scatter.second_distribution;
    if let Some(hist) = second.histogram.as_ref() {
        let mut marginal = ChartBuilder::on(&right)
            .margin(10)
            .x_label_area_size(40)
            .build_cartesian_2d(0.0..upper_bound(hist.max_count() as f64), y_range)?;
        marginal.configure_mesh().disable_mesh().draw()?;
        // Empty bins would draw as zero-width bars.
        let filled = hist.counts.iter().enumerate().filter(|(_, count)| **count > 0);
        marginal.draw_series(filled.map(|(i, &count)| {
            Rectangle::new(
                [(0.0, hist.edges[i]), (count as f64, hist.edges[i + 1])],
                BAR.mix(0.6).filled(),
            )
        }))?;
        marginal.draw_series(LineSeries::new(
            second.density.iter().map(|&(y, d)| (d, y)),
            RED.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}
