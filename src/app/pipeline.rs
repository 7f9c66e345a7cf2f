//! Shared analysis pipeline used by the `report`, `fit`, and `project`
//! commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> per-phase fit -> projection -> crossings -> derived table
//!
//! The command handlers can then focus on presentation (report bundle vs
//! terminal diagnostics).

use crate::domain::{Crossing, PhaseFit, ReportConfig, TableRow};
use crate::error::AppError;
use crate::fit::{fit_phase, FitOptions};
use crate::io::ingest::{ingest, IngestedData};
use crate::project::{crossings, project_phase, value_on, ProjectedPoint};
use crate::report::build_table;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub ingest: IngestedData,
    pub pre: PhaseFit,
    pub post: PhaseFit,
    /// Pre-phase curve evaluated at the horizon: where the disease was
    /// heading without the treatment change.
    pub pre_horizon_value: f64,
    /// Both thresholds resolved against the post-phase curve.
    pub crossings: Vec<Crossing>,
    pub pre_projection: Vec<ProjectedPoint>,
    pub post_projection: Vec<ProjectedPoint>,
    pub table: Vec<TableRow>,
}

/// Execute the full analysis and return the computed outputs.
pub fn run_analysis(config: &ReportConfig) -> Result<AnalysisOutput, AppError> {
    // 1) Load, validate, and partition the measurements.
    let ingest = ingest(config)?;

    // 2) Fit each phase against its model family.
    let opts = FitOptions {
        max_iterations: config.max_iterations,
    };
    let pre = PhaseFit {
        kind: ingest.pre.kind,
        start: ingest.pre.start,
        fit: fit_phase(&ingest.pre, &opts)?,
    };
    let post = PhaseFit {
        kind: ingest.post.kind,
        start: ingest.post.start,
        fit: fit_phase(&ingest.post, &opts)?,
    };

    // 3) Project both curves through the horizon and resolve thresholds
    //    against the post curve.
    let horizon = ingest.spec.horizon;
    let pre_projection = project_phase(&pre, horizon);
    let post_projection = project_phase(&post, horizon);
    let pre_horizon_value = value_on(&pre, horizon);
    let crossings = crossings(&post, &ingest.spec);

    // 4) Derive the measurement table.
    let table = build_table(&ingest.data.measurements);

    Ok(AnalysisOutput {
        ingest,
        pre,
        post,
        pre_horizon_value,
        crossings,
        pre_projection,
        post_projection,
        table,
    })
}

/// Observed measurements as chart points in global day offsets (days since
/// the first measurement).
pub fn observed_points(run: &AnalysisOutput) -> Vec<(f64, f64)> {
    let origin = run.ingest.stats.date_min;
    run.ingest
        .data
        .measurements
        .iter()
        .map(|m| ((m.date - origin).num_days() as f64, m.kappa))
        .collect()
}

/// Labelled fitted curves as chart series in global day offsets.
pub fn chart_curves(run: &AnalysisOutput) -> Vec<(String, Vec<(f64, f64)>)> {
    let origin = run.ingest.stats.date_min;
    [
        (&run.pre, &run.pre_projection),
        (&run.post, &run.post_projection),
    ]
    .into_iter()
    .map(|(fit, projection)| {
        let label = format!(
            "{} {}",
            fit.kind.display_name(),
            fit.fit.model.kind.display_name()
        );
        let series = projection
            .iter()
            .map(|p| ((p.date - origin).num_days() as f64, p.value))
            .collect();
        (label, series)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CrossingOutcome, ModelKind, PhaseKind};
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flc-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_fixture(dir: &PathBuf) -> ReportConfig {
        let data = r#"{
          "measurements": [
            { "date": "2025-01-09", "kappa": 167.2, "lambda": 1.2 },
            { "date": "2025-01-23", "kappa": 87.1, "lambda": 1.3 },
            { "date": "2025-02-06", "kappa": 55.0, "lambda": 1.2 },
            { "date": "2025-02-20", "kappa": 40.9, "lambda": 1.4 },
            { "date": "2025-03-06", "kappa": 34.2, "lambda": 1.3 },
            { "date": "2025-03-20", "kappa": 30.9, "lambda": 1.2 },
            { "date": "2025-04-03", "kappa": 29.1, "lambda": 1.3 },
            { "date": "2025-04-17", "kappa": 20.5, "lambda": 1.2 },
            { "date": "2025-05-01", "kappa": 14.5, "lambda": 1.3 },
            { "date": "2025-05-15", "kappa": 10.2, "lambda": 1.2 },
            { "date": "2025-05-29", "kappa": 7.2, "lambda": 1.3 },
            { "date": "2025-06-12", "kappa": 5.1, "lambda": 1.2 },
            { "date": "2025-06-26", "kappa": 3.6, "lambda": 1.3 }
          ],
          "settings": {
            "split_date": "2025-04-03",
            "projection_end_date": "2025-10-24",
            "vgpr_threshold": 19.4,
            "cr_threshold": 5.0
          }
        }"#;
        let path = dir.join("data.json");
        fs::write(&path, data).unwrap();

        ReportConfig {
            data_path: path,
            notes_path: dir.join("notes.json"),
            out_dir: dir.clone(),
            pre_model: None,
            post_model: None,
            max_iterations: crate::fit::DEFAULT_MAX_ITERATIONS,
            chart_width: 750,
            chart_height: 550,
            no_charts: true,
            export_csv: None,
        }
    }

    #[test]
    fn analysis_fits_projects_and_tabulates() {
        let dir = scratch_dir("pipeline");
        let config = write_fixture(&dir);
        let run = run_analysis(&config).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(run.pre.kind, PhaseKind::Pre);
        assert_eq!(run.pre.fit.model.kind, ModelKind::Gompertz);
        assert_eq!(run.post.fit.model.kind, ModelKind::Exponential);

        // The split-day reading belongs to both phases.
        assert_eq!(run.ingest.pre.n(), 7);
        assert_eq!(run.ingest.post.n(), 7);

        // Daily inclusive projections from each phase start.
        assert_eq!(run.pre_projection.len(), 289);
        assert_eq!(run.post_projection.len(), 205);

        // The series dives well under both thresholds, so both crossings
        // land before the horizon.
        assert_eq!(run.crossings.len(), 2);
        for c in &run.crossings {
            assert!(
                matches!(c.outcome, CrossingOutcome::Reached { .. }),
                "expected a reached crossing, got {:?}",
                c.outcome
            );
        }

        // One table row per measurement, first row has no predecessor.
        assert_eq!(run.table.len(), 13);
        assert_eq!(run.table[0].delta, 0.0);

        // The stalled pre curve sits far above the post curve at the
        // horizon.
        assert!(run.pre_horizon_value > 19.0);
    }

    #[test]
    fn chart_series_share_the_global_origin() {
        let dir = scratch_dir("pipeline-chart");
        let config = write_fixture(&dir);
        let run = run_analysis(&config).unwrap();
        fs::remove_dir_all(&dir).ok();

        let observed = observed_points(&run);
        assert_eq!(observed[0], (0.0, 167.2));
        assert_eq!(observed.last().unwrap().0, 168.0);

        let curves = chart_curves(&run);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].0, "pre-treatment Gompertz");
        // The pre curve starts at the origin; the post curve at the split.
        assert_eq!(curves[0].1[0].0, 0.0);
        assert_eq!(curves[1].1[0].0, 84.0);
        // Both projections run through the horizon.
        assert_eq!(curves[0].1.last().unwrap().0, 288.0);
        assert_eq!(curves[1].1.last().unwrap().0, 288.0);
    }
}
