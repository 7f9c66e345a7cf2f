//! SVG chart pages for the report bundle.
//!
//! The chart is intentionally data-driven: all series are computed by the
//! caller in global day offsets (x = days since the first measurement), and
//! this module only draws. The log page reuses the linear code path by
//! transforming values up front and formatting the tick labels back, which
//! keeps one rendering routine for both scales.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;

use crate::domain::{Crossing, CrossingOutcome};
use crate::error::{AppError, EXIT_INPUT};
use crate::report::format::long_date;

/// Value axis treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartScale {
    Linear,
    Log,
}

/// A render-only chart description.
pub struct ChartSpec<'a> {
    pub title: String,
    /// Date at `x = 0`; tick labels derive from it.
    pub origin: NaiveDate,
    /// Observed measurements as `(day offset, value)`.
    pub observed: &'a [(f64, f64)],
    /// Labelled fitted curves, one per phase.
    pub curves: &'a [(String, Vec<(f64, f64)>)],
    /// Thresholds draw as horizontal rules; predicted crossings as vertical
    /// ones.
    pub crossings: &'a [Crossing],
    pub scale: ChartScale,
    pub width: u32,
    pub height: u32,
}

const MIN_WIDTH: u32 = 300;
const MIN_HEIGHT: u32 = 200;

/// Smallest value the log page will represent.
const LOG_FLOOR: f64 = 1e-3;

const CURVE_COLORS: [RGBColor; 2] = [RGBColor(0, 128, 0), RGBColor(0, 90, 200)];
const THRESHOLD_COLORS: [RGBColor; 2] = [RGBColor(128, 0, 128), RGBColor(200, 30, 30)];

/// Render one chart page to an SVG file.
pub fn render_chart(path: &Path, spec: &ChartSpec) -> Result<(), AppError> {
    if spec.width < MIN_WIDTH || spec.height < MIN_HEIGHT {
        return Err(AppError::new(
            EXIT_INPUT,
            format!(
                "Chart size {}x{} is too small (minimum {MIN_WIDTH}x{MIN_HEIGHT}).",
                spec.width, spec.height
            ),
        ));
    }

    let (x0, x1, y_lo, y_hi) = bounds(spec)?;
    let scale = spec.scale;
    let ty = move |v: f64| match scale {
        ChartScale::Linear => v,
        ChartScale::Log => v.max(LOG_FLOOR).log10(),
    };
    let origin = spec.origin;

    let err = |e: &dyn std::fmt::Display| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to render chart '{}': {e}", path.display()),
        )
    };

    let root = SVGBackend::new(path, (spec.width, spec.height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 16))
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 35)
        .build_cartesian_2d(x0..x1, ty(y_lo)..ty(y_hi))
        .map_err(|e| err(&e))?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc(match spec.scale {
            ChartScale::Linear => "Kappa (mg/L)",
            ChartScale::Log => "Kappa (mg/L, log scale)",
        })
        .x_labels(6)
        .y_labels(6)
        .x_label_formatter(&move |x: &f64| {
            (origin + Duration::days(x.round() as i64)).to_string()
        })
        .y_label_formatter(&move |y: &f64| match scale {
            ChartScale::Linear => format!("{y:.1}"),
            ChartScale::Log => {
                let v = 10f64.powf(*y);
                if v < 100.0 {
                    format!("{v:.1}")
                } else {
                    format!("{v:.0}")
                }
            }
        })
        .light_line_style(WHITE.mix(0.0))
        .draw()
        .map_err(|e| err(&e))?;

    // Fitted phase curves.
    for (i, (label, series)) in spec.curves.iter().enumerate() {
        let color = CURVE_COLORS[i % CURVE_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                series.iter().map(|&(x, y)| (x, ty(y))),
                color.stroke_width(2),
            ))
            .map_err(|e| err(&e))?
            .label(label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    // Threshold rules and, where a crossing is predicted, its date.
    for (i, c) in spec.crossings.iter().enumerate() {
        let color = THRESHOLD_COLORS[i % THRESHOLD_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                [(x0, ty(c.threshold)), (x1, ty(c.threshold))],
                color.stroke_width(1),
            ))
            .map_err(|e| err(&e))?
            .label(format!("{} (<{} mg/L)", c.kind.display_name(), c.threshold))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(1))
            });

        if let CrossingOutcome::Reached { date, .. } = c.outcome {
            let x = (date - origin).num_days() as f64;
            chart
                .draw_series(LineSeries::new(
                    [(x, ty(y_lo)), (x, ty(y_hi))],
                    color.mix(0.6).stroke_width(1),
                ))
                .map_err(|e| err(&e))?
                .label(format!("{} by {}", c.kind.display_name(), long_date(date)))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 18, y)], color.mix(0.6))
                });
        }
    }

    // Observed points draw last so they sit on top of the curves.
    chart
        .draw_series(
            spec.observed
                .iter()
                .map(|&(x, y)| Circle::new((x, ty(y)), 3, BLACK.filled())),
        )
        .map_err(|e| err(&e))?
        .label("Observed")
        .legend(|(x, y)| Circle::new((x + 9, y), 3, BLACK.filled()));

    chart
        .configure_series_labels()
        .border_style(BLACK.mix(0.4))
        .background_style(WHITE.mix(0.85))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(|e| err(&e))?;

    root.present().map_err(|e| err(&e))?;
    Ok(())
}

/// Shared axis bounds over every series and threshold.
fn bounds(spec: &ChartSpec) -> Result<(f64, f64, f64, f64), AppError> {
    let xs = spec
        .observed
        .iter()
        .map(|&(x, _)| x)
        .chain(spec.curves.iter().flat_map(|(_, s)| s.iter().map(|&(x, _)| x)));
    let ys = spec
        .observed
        .iter()
        .map(|&(_, y)| y)
        .chain(spec.curves.iter().flat_map(|(_, s)| s.iter().map(|&(_, y)| y)))
        .chain(spec.crossings.iter().map(|c| c.threshold));

    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    for x in xs {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
    }
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for y in ys {
        if y > 0.0 {
            y_min = y_min.min(y);
        }
        y_max = y_max.max(y);
    }

    if !(x_min.is_finite() && x_max.is_finite() && y_min.is_finite() && y_max.is_finite())
        || x_max <= x_min
        || y_max <= 0.0
    {
        return Err(AppError::new(
            EXIT_INPUT,
            "Chart has no drawable series (empty or degenerate bounds).",
        ));
    }

    let x_pad = (x_max - x_min) * 0.02;
    let (y_lo, y_hi) = match spec.scale {
        ChartScale::Linear => (0.0, y_max * 1.05),
        ChartScale::Log => ((y_min * 0.8).max(LOG_FLOOR), y_max * 1.2),
    };
    Ok((x_min - x_pad, x_max + x_pad, y_lo, y_hi))
}
