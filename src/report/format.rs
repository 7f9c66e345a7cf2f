//! Formatted output: the terminal summary and the report document.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use chrono::NaiveDate;

use crate::domain::{
    Crossing, CrossingOutcome, DatasetStats, NoteSection, PhaseFit, RunSpec, TableRow,
};
use crate::report::table::render_markdown;

/// Filename stem shared by the report document and its chart pages.
pub fn report_stem(latest: NaiveDate) -> String {
    format!("flc_report_through_{latest}")
}

/// Report-style long date, e.g. `Apr 12, 2025`.
pub fn long_date(d: NaiveDate) -> String {
    d.format("%b %d, %Y").to_string()
}

/// The right-hand side of a crossing line: a date, or why there is none.
pub fn describe_outcome(outcome: &CrossingOutcome) -> String {
    match outcome {
        CrossingOutcome::Reached { date, .. } => long_date(*date),
        CrossingOutcome::BeyondHorizon { date, .. } => {
            format!("{} (beyond the projection window)", long_date(*date))
        }
        CrossingOutcome::AlreadyReached { date } => {
            format!("already below at {}", long_date(*date))
        }
        CrossingOutcome::Unreachable { floor } => {
            format!("not reachable (model floor {floor:.1} mg/L)")
        }
    }
}

/// One labelled crossing line, e.g. `VGPR (<19.4 mg/L): Apr 12, 2025`.
pub fn format_crossing(c: &Crossing) -> String {
    format!(
        "{} (<{} mg/L): {}",
        c.kind.display_name(),
        c.threshold,
        describe_outcome(&c.outcome)
    )
}

fn format_params(fit: &PhaseFit) -> String {
    let names = fit.fit.model.kind.param_names();
    let parts: Vec<String> = names
        .iter()
        .zip(fit.fit.model.params.iter())
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect();
    parts.join(" ")
}

/// Format the full run summary (dataset stats + phase fits + crossings).
pub fn format_run_summary(
    stats: &DatasetStats,
    spec: &RunSpec,
    pre: &PhaseFit,
    post: &PhaseFit,
    crossings: &[Crossing],
) -> String {
    let mut out = String::new();

    out.push_str("=== flc - Free Light Chain Report ===\n");
    out.push_str(&format!(
        "Measurements: n={} | {} -> {} | kappa=[{:.1}, {:.1}] mg/L\n",
        stats.n_measurements, stats.date_min, stats.date_max, stats.kappa_min, stats.kappa_max
    ));
    out.push_str(&format!(
        "Split: {} | projection through {}\n",
        spec.split_date, spec.horizon
    ));

    out.push_str("\nPhase fits:\n");
    for fit in [pre, post] {
        out.push_str(&format!(
            "  {:<15} {:<12} n={} RMSE={:.3} {}\n",
            fit.kind.display_name(),
            fit.fit.model.kind.display_name(),
            fit.fit.quality.n,
            fit.fit.quality.rmse,
            format_params(fit),
        ));
    }

    out.push_str("\nProjected crossings:\n");
    for c in crossings {
        out.push_str(&format!("  {}\n", format_crossing(c)));
    }

    out
}

/// Everything the report document draws from.
pub struct ReportDocument<'a> {
    pub stats: &'a DatasetStats,
    pub spec: &'a RunSpec,
    pub table: &'a [TableRow],
    pub pre: &'a PhaseFit,
    pub post: &'a PhaseFit,
    pub crossings: &'a [Crossing],
    /// Pre-phase model value at the projection horizon.
    pub pre_horizon_value: f64,
    pub notes_title: &'a str,
    /// Note sections with placeholders already substituted.
    pub sections: &'a [NoteSection],
    /// Chart filenames when chart pages were written (linear, log).
    pub charts: Option<(&'a str, &'a str)>,
}

/// Render the full report as Markdown.
pub fn render_report_markdown(doc: &ReportDocument) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", doc.notes_title));
    out.push_str(&format!(
        "Measurements through {}. Projection through {}.\n\n",
        long_date(doc.stats.date_max),
        long_date(doc.spec.horizon)
    ));

    out.push_str("## Projections\n\n");
    if let Some((linear, log)) = doc.charts {
        out.push_str(&format!("![Kappa, linear scale]({linear})\n\n"));
        out.push_str(&format!("![Kappa, log scale]({log})\n\n"));
    }
    for fit in [doc.pre, doc.post] {
        out.push_str(&format!(
            "- {} phase: {} fit from {} (n={}, RMSE={:.3}, {})\n",
            fit.kind.display_name(),
            fit.fit.model.kind.display_name(),
            long_date(fit.start),
            fit.fit.quality.n,
            fit.fit.quality.rmse,
            format_params(fit),
        ));
    }
    out.push_str(&format!(
        "- {} phase value at the horizon: {:.2} mg/L\n",
        doc.pre.kind.display_name(),
        doc.pre_horizon_value
    ));
    for c in doc.crossings {
        out.push_str(&format!("- {}\n", format_crossing(c)));
    }
    out.push('\n');

    out.push_str("## Free Light Chain Results\n\n");
    out.push_str(&render_markdown(doc.table));
    out.push('\n');

    for section in doc.sections {
        out.push_str(&format!("## {}\n\n", section.title));
        for line in &section.content {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    // Trim the trailing blank line without losing the final newline.
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}
