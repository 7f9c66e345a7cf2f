//! The derived measurement table.
//!
//! Every published report carries the same table: raw kappa and lambda, the
//! kappa/lambda ratio, and the change in kappa against the previous reading.
//! Derivation happens once, here, so the CSV export and the report page can
//! never disagree.

use crate::domain::{Measurement, TableRow};

/// Build the published table from raw measurements.
///
/// The first row has no predecessor; its changes are zero rather than blank
/// so the table stays fully numeric.
pub fn build_table(measurements: &[Measurement]) -> Vec<TableRow> {
    measurements
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let (delta, pct_change) = if i == 0 {
                (0.0, 0.0)
            } else {
                let prev = measurements[i - 1].kappa;
                (
                    round_to(m.kappa - prev, 1),
                    round_to((m.kappa - prev) / prev * 100.0, 1),
                )
            };
            TableRow {
                date: m.date,
                kappa: m.kappa,
                lambda: m.lambda,
                ratio: round_to(m.kappa / m.lambda, 2),
                delta,
                pct_change,
            }
        })
        .collect()
}

/// Render the table as a Markdown block.
pub fn render_markdown(rows: &[TableRow]) -> String {
    let mut out = String::new();
    out.push_str("| Date | Kappa | Lambda | Ratio | Delta | % Change |\n");
    out.push_str("|------|-------|--------|-------|-------|----------|\n");
    for r in rows {
        out.push_str(&format!(
            "| {} | {:.1} | {:.1} | {:.2} | {:+.1} | {:.1}% |\n",
            r.date, r.kappa, r.lambda, r.ratio, r.delta, r.pct_change
        ));
    }
    out
}

fn round_to(v: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (v * f).round() / f
}
