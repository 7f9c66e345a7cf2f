//! Data file writes and CSV export.
//!
//! The CSV export mirrors the measurement table and is meant to be easy to
//! consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{DataFile, Measurement, PhaseFit, TableRow};
use crate::error::{AppError, EXIT_INPUT};
use crate::io::ingest::load_data_file;
use crate::project::value_on;

/// Write the derived measurement table to a CSV file, one row per
/// measurement with its phase, day offset into that phase, and the fitted
/// value and residual from the phase's curve.
///
/// The split-day measurement belongs to both fits; the CSV labels it with
/// the post phase, whose curve drives the projections.
pub fn write_table_csv(
    path: &Path,
    rows: &[TableRow],
    pre: &PhaseFit,
    post: &PhaseFit,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create export CSV '{}': {e}", path.display()),
        )
    })?;

    writeln!(
        file,
        "date,phase,day,kappa_mg_l,lambda_mg_l,ratio,delta,pct_change,fitted,residual"
    )
    .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV header: {e}")))?;

    for r in rows {
        let phase = if r.date < post.start { pre } else { post };
        let day = (r.date - phase.start).num_days();
        let fitted = value_on(phase, r.date);
        writeln!(
            file,
            "{},{},{},{},{},{:.2},{:.1},{:.1},{:.4},{:.4}",
            r.date,
            phase.kind.key(),
            day,
            r.kappa,
            r.lambda,
            r.ratio,
            r.delta,
            r.pct_change,
            fitted,
            r.kappa - fitted,
        )
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write a `data.json` measurement file.
///
/// Pretty-printed so the file stays pleasant to maintain by hand.
pub fn write_data_file(path: &Path, data: &DataFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create data file '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, data)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write data file: {e}")))?;
    Ok(())
}

/// Insert a new measurement into an existing `data.json`, keeping dates in
/// order. Returns the updated measurement count.
///
/// A second measurement on an existing date is rejected; correcting a value
/// is a hand edit, not an append.
pub fn append_measurement(path: &Path, m: Measurement) -> Result<usize, AppError> {
    if !m.kappa.is_finite() || m.kappa <= 0.0 {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("kappa must be finite and > 0, got {}.", m.kappa),
        ));
    }
    if !m.lambda.is_finite() || m.lambda <= 0.0 {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("lambda must be finite and > 0, got {}.", m.lambda),
        ));
    }

    let mut data = load_data_file(path)?;
    if data.measurements.iter().any(|x| x.date == m.date) {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("A measurement for {} already exists.", m.date),
        ));
    }

    let pos = data.measurements.partition_point(|x| x.date < m.date);
    data.measurements.insert(pos, m);
    write_data_file(path, &data)?;
    Ok(data.measurements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveModel, FitQuality, FitResult, ModelKind, PhaseKind, StudySettings};
    use chrono::NaiveDate;
    use std::fs;
    use std::path::PathBuf;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flc-{}-{name}", std::process::id()))
    }

    fn tiny_data() -> DataFile {
        DataFile {
            measurements: vec![
                Measurement {
                    date: d(2025, 4, 3),
                    kappa: 176.8,
                    lambda: 1.2,
                },
                Measurement {
                    date: d(2025, 6, 5),
                    kappa: 23.2,
                    lambda: 1.4,
                },
            ],
            settings: StudySettings {
                split_date: d(2025, 6, 5),
                projection_end_date: d(2025, 12, 31),
                vgpr_threshold: 19.4,
                cr_threshold: 5.0,
                pre_model: None,
                post_model: None,
            },
        }
    }

    #[test]
    fn data_file_round_trips_through_disk() {
        let path = scratch_path("roundtrip.json");
        let data = tiny_data();
        write_data_file(&path, &data).unwrap();
        let back = load_data_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(back.measurements.len(), 2);
        assert_eq!(back.measurements[1].date, d(2025, 6, 5));
        assert_eq!(back.settings.split_date, d(2025, 6, 5));
    }

    #[test]
    fn append_keeps_dates_ordered_and_rejects_duplicates() {
        let path = scratch_path("append.json");
        write_data_file(&path, &tiny_data()).unwrap();

        // A mid-series date slots in between the existing readings.
        let n = append_measurement(
            &path,
            Measurement {
                date: d(2025, 5, 8),
                kappa: 84.3,
                lambda: 1.3,
            },
        )
        .unwrap();
        assert_eq!(n, 3);

        let back = load_data_file(&path).unwrap();
        let dates: Vec<NaiveDate> = back.measurements.iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![d(2025, 4, 3), d(2025, 5, 8), d(2025, 6, 5)]);

        let err = append_measurement(
            &path,
            Measurement {
                date: d(2025, 5, 8),
                kappa: 80.0,
                lambda: 1.3,
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn append_rejects_unusable_values() {
        let path = scratch_path("append-bad.json");
        write_data_file(&path, &tiny_data()).unwrap();
        let err = append_measurement(
            &path,
            Measurement {
                date: d(2025, 7, 3),
                kappa: -1.0,
                lambda: 1.4,
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        fs::remove_file(&path).ok();
    }

    fn exp_fit(kind: PhaseKind, start: NaiveDate, a: f64, k: f64) -> PhaseFit {
        PhaseFit {
            kind,
            start,
            fit: FitResult {
                model: CurveModel {
                    kind: ModelKind::Exponential,
                    params: vec![a, k],
                },
                quality: FitQuality {
                    sse: 0.0,
                    rmse: 0.0,
                    n: 4,
                    iterations: 1,
                },
            },
        }
    }

    #[test]
    fn table_csv_labels_phases_and_reports_residuals() {
        let path = scratch_path("table.csv");
        let rows = vec![
            TableRow {
                date: d(2025, 4, 3),
                kappa: 176.8,
                lambda: 1.2,
                ratio: 147.33,
                delta: 0.0,
                pct_change: 0.0,
            },
            TableRow {
                date: d(2025, 5, 8),
                kappa: 84.3,
                lambda: 1.3,
                ratio: 64.85,
                delta: -92.5,
                pct_change: -52.3,
            },
            TableRow {
                date: d(2025, 6, 5),
                kappa: 23.2,
                lambda: 1.4,
                ratio: 16.57,
                delta: -61.1,
                pct_change: -72.5,
            },
        ];
        let pre = exp_fit(PhaseKind::Pre, d(2025, 4, 3), 176.8, 0.02);
        let post = exp_fit(PhaseKind::Post, d(2025, 6, 5), 23.2, 0.012);

        write_table_csv(&path, &rows, &pre, &post).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "date,phase,day,kappa_mg_l,lambda_mg_l,ratio,delta,pct_change,fitted,residual"
        );
        // Day 0 of each phase evaluates to the curve's starting level, so
        // the residual is exactly zero there.
        assert_eq!(
            lines[1],
            "2025-04-03,pre,0,176.8,1.2,147.33,0.0,0.0,176.8000,0.0000"
        );
        assert!(lines[2].starts_with("2025-05-08,pre,35,84.3,1.3,64.85,-92.5,-52.3,"));
        // The split-day reading lands in the post phase.
        assert_eq!(
            lines[3],
            "2025-06-05,post,0,23.2,1.4,16.57,-61.1,-72.5,23.2000,0.0000"
        );
    }
}
