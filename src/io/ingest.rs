//! Measurement file ingest and phase partitioning.
//!
//! This module turns `data.json` into fit-ready phases.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Whole-file validation**: measurements are few and hand-curated, so
//!   one bad entry aborts the run instead of being silently skipped
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no fitting logic here

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{
    DataFile, DatasetStats, Measurement, ModelKind, Observation, Phase, PhaseKind, ReportConfig,
    RunSpec,
};
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT};

/// Ingest output: the validated file, the resolved run settings, and the
/// partitioned phases.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub data: DataFile,
    pub spec: RunSpec,
    pub pre: Phase,
    pub post: Phase,
    pub stats: DatasetStats,
}

/// Load, validate, and partition a measurement file.
pub fn ingest(config: &ReportConfig) -> Result<IngestedData, AppError> {
    let data = load_data_file(&config.data_path)?;
    validate(&data)?;

    let spec = resolve_run_spec(&data, config);
    let (pre, post) = partition_phases(&data.measurements, &spec);
    let stats = compute_stats(&data.measurements)
        .ok_or_else(|| AppError::new(EXIT_DATA, "No measurements remain after validation."))?;

    Ok(IngestedData {
        data,
        spec,
        pre,
        post,
        stats,
    })
}

/// Read a `data.json` measurement file.
pub fn load_data_file(path: &Path) -> Result<DataFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to open data file '{}': {e}", path.display()),
        )
    })?;
    let data: DataFile = serde_json::from_reader(file).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Invalid data file '{}': {e}", path.display()),
        )
    })?;
    Ok(data)
}

fn validate(data: &DataFile) -> Result<(), AppError> {
    if data.measurements.is_empty() {
        return Err(AppError::new(
            EXIT_DATA,
            "Data file contains no measurements.",
        ));
    }

    for (idx, m) in data.measurements.iter().enumerate() {
        if !m.kappa.is_finite() || m.kappa <= 0.0 {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "Measurement {} ({}): kappa must be finite and > 0, got {}.",
                    idx + 1,
                    m.date,
                    m.kappa
                ),
            ));
        }
        if !m.lambda.is_finite() || m.lambda <= 0.0 {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "Measurement {} ({}): lambda must be finite and > 0, got {}.",
                    idx + 1,
                    m.date,
                    m.lambda
                ),
            ));
        }
    }

    for pair in data.measurements.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "Measurement dates must be strictly increasing: {} does not follow {}.",
                    pair[1].date, pair[0].date
                ),
            ));
        }
    }

    let s = &data.settings;
    if !s.cr_threshold.is_finite() || s.cr_threshold <= 0.0 {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("`cr_threshold` must be finite and > 0, got {}.", s.cr_threshold),
        ));
    }
    if !s.vgpr_threshold.is_finite() || s.vgpr_threshold <= s.cr_threshold {
        return Err(AppError::new(
            EXIT_INPUT,
            format!(
                "`vgpr_threshold` ({}) must sit above `cr_threshold` ({}).",
                s.vgpr_threshold, s.cr_threshold
            ),
        ));
    }
    if s.projection_end_date < s.split_date {
        return Err(AppError::new(
            EXIT_INPUT,
            format!(
                "`projection_end_date` ({}) precedes `split_date` ({}).",
                s.projection_end_date, s.split_date
            ),
        ));
    }
    // Guaranteed non-empty by the checks above.
    if let Some(last) = data.measurements.last() {
        if s.projection_end_date <= last.date {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "`projection_end_date` ({}) must lie after the last measurement ({}).",
                    s.projection_end_date, last.date
                ),
            ));
        }
    }

    Ok(())
}

/// Merge file settings with CLI overrides into the effective run settings.
///
/// Model precedence: CLI flag, then the file's settings, then the built-in
/// default for the phase.
pub fn resolve_run_spec(data: &DataFile, config: &ReportConfig) -> RunSpec {
    let s = &data.settings;
    RunSpec {
        split_date: s.split_date,
        horizon: s.projection_end_date,
        vgpr_threshold: s.vgpr_threshold,
        cr_threshold: s.cr_threshold,
        pre_model: config
            .pre_model
            .or(s.pre_model)
            .unwrap_or(PhaseKind::Pre.default_model()),
        post_model: config
            .post_model
            .or(s.post_model)
            .unwrap_or(PhaseKind::Post.default_model()),
    }
}

/// Split measurements into treatment phases at the split date.
///
/// A measurement taken exactly on the split date belongs to both phases: it
/// closes the decline under the old regimen and anchors the new one at
/// `t = 0`.
pub fn partition_phases(measurements: &[Measurement], spec: &RunSpec) -> (Phase, Phase) {
    let pre_rows: Vec<&Measurement> = measurements
        .iter()
        .filter(|m| m.date <= spec.split_date)
        .collect();
    let post_rows: Vec<&Measurement> = measurements
        .iter()
        .filter(|m| m.date >= spec.split_date)
        .collect();

    (
        build_phase(PhaseKind::Pre, spec.pre_model, &pre_rows, spec.split_date),
        build_phase(PhaseKind::Post, spec.post_model, &post_rows, spec.split_date),
    )
}

fn build_phase(
    kind: PhaseKind,
    model_kind: ModelKind,
    rows: &[&Measurement],
    fallback_start: NaiveDate,
) -> Phase {
    // An empty phase keeps a start date so downstream errors can name it.
    let start = rows.first().map(|m| m.date).unwrap_or(fallback_start);
    let observations = rows
        .iter()
        .map(|m| Observation {
            t: (m.date - start).num_days() as f64,
            value: m.kappa,
        })
        .collect();
    Phase {
        kind,
        start,
        model_kind,
        observations,
    }
}

fn compute_stats(measurements: &[Measurement]) -> Option<DatasetStats> {
    let first = measurements.first()?;
    let last = measurements.last()?;

    let mut kappa_min = f64::INFINITY;
    let mut kappa_max = f64::NEG_INFINITY;
    for m in measurements {
        kappa_min = kappa_min.min(m.kappa);
        kappa_max = kappa_max.max(m.kappa);
    }
    if !kappa_min.is_finite() || !kappa_max.is_finite() {
        return None;
    }

    Some(DatasetStats {
        n_measurements: measurements.len(),
        date_min: first.date,
        date_max: last.date,
        kappa_min,
        kappa_max,
        kappa_latest: last.kappa,
    })
}
