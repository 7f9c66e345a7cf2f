//! Chart rendering for report pages.

pub mod chart;

pub use chart::{render_chart, ChartScale, ChartSpec};
