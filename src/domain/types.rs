//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and projection
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Parametric decay family fitted to a phase.
///
/// Both families describe reduction kinetics: the curve starts at the first
/// observation and decreases monotonically toward an asymptote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `y(t) = A * exp(-B * exp(-C * t))`, asymptote `A` (slowing decay).
    Gompertz,
    /// `y(t) = A * exp(-k * t)`, asymptote `0` (constant-rate decay).
    Exponential,
}

impl ModelKind {
    /// Human-readable label for terminal output and report pages.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Gompertz => "Gompertz",
            ModelKind::Exponential => "Exponential",
        }
    }

    /// Number of free parameters for this family.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Gompertz => 3,
            ModelKind::Exponential => 2,
        }
    }

    /// Parameter names in vector order, for display and exports.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Gompertz => &["A", "B", "C"],
            ModelKind::Exponential => &["A", "k"],
        }
    }
}

/// Treatment phase identity.
///
/// The split date partitions measurements into exactly these two phases; the
/// boundary measurement belongs to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Pre,
    Post,
}

impl PhaseKind {
    pub fn display_name(self) -> &'static str {
        match self {
            PhaseKind::Pre => "pre-treatment",
            PhaseKind::Post => "post-treatment",
        }
    }

    /// Short machine-friendly label for CSV columns and keys.
    pub fn key(self) -> &'static str {
        match self {
            PhaseKind::Pre => "pre",
            PhaseKind::Post => "post",
        }
    }

    /// Default model family when the settings do not override it.
    pub fn default_model(self) -> ModelKind {
        match self {
            PhaseKind::Pre => ModelKind::Gompertz,
            PhaseKind::Post => ModelKind::Exponential,
        }
    }
}

/// Clinical response thresholds projected against the fitted curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdKind {
    /// Very Good Partial Response.
    Vgpr,
    /// Complete Response (the deeper threshold).
    Cr,
}

impl ThresholdKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ThresholdKind::Vgpr => "VGPR",
            ThresholdKind::Cr => "CR",
        }
    }

    /// Template key prefix (`vgpr_date`, `cr_date`).
    pub fn key(self) -> &'static str {
        match self {
            ThresholdKind::Vgpr => "vgpr",
            ThresholdKind::Cr => "cr",
        }
    }
}

/// One laboratory result as stored in `data.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub date: NaiveDate,
    /// Kappa free light chain concentration (mg/L).
    pub kappa: f64,
    /// Lambda free light chain concentration (mg/L).
    pub lambda: f64,
}

/// One derived row of the measurement table.
///
/// The derived columns carry the precision the table is published at:
/// `ratio` two decimals, `delta` and `pct_change` one. The first row has no
/// predecessor, so its changes are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableRow {
    pub date: NaiveDate,
    pub kappa: f64,
    pub lambda: f64,
    /// Kappa / lambda.
    pub ratio: f64,
    /// Absolute kappa change since the previous row (mg/L).
    pub delta: f64,
    /// Percent kappa change since the previous row.
    pub pct_change: f64,
}

/// A fit-ready observation: days since the phase start, kappa value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Time offset in days (>= 0, strictly increasing within a phase).
    pub t: f64,
    /// Observed concentration (mg/L, > 0).
    pub value: f64,
}

/// A contiguous run of observations sharing one regimen and one model.
///
/// Phases are immutable once built by ingest; fitting never mutates them.
#[derive(Debug, Clone)]
pub struct Phase {
    pub kind: PhaseKind,
    /// Date of the first observation in the phase (`t = 0`).
    pub start: NaiveDate,
    pub model_kind: ModelKind,
    pub observations: Vec<Observation>,
}

impl Phase {
    pub fn n(&self) -> usize {
        self.observations.len()
    }

    /// Value at `t = 0` (the phase's first observation).
    pub fn first_value(&self) -> Option<f64> {
        self.observations.first().map(|o| o.value)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.observations.last().map(|o| o.value)
    }

    pub fn min_value(&self) -> Option<f64> {
        self.observations
            .iter()
            .map(|o| o.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    pub fn max_value(&self) -> Option<f64> {
        self.observations
            .iter()
            .map(|o| o.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Last time offset (days from phase start to its final observation).
    pub fn span_days(&self) -> f64 {
        self.observations.last().map(|o| o.t).unwrap_or(0.0)
    }
}

/// Fitted model parameters and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveModel {
    pub kind: ModelKind,
    /// Parameter vector in `ModelKind::param_names` order.
    pub params: Vec<f64>,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    /// Solver iterations spent on the winning candidate.
    pub iterations: usize,
}

/// Fit output for a single phase's model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: CurveModel,
    pub quality: FitQuality,
}

/// A fitted phase: the phase identity plus its fit, as consumed by the
/// projection and report layers.
#[derive(Debug, Clone)]
pub struct PhaseFit {
    pub kind: PhaseKind,
    pub start: NaiveDate,
    pub fit: FitResult,
}

/// What the projection concluded about one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrossingOutcome {
    /// Crossing predicted on or before the horizon. `date` is the first whole
    /// day strictly below the threshold.
    Reached { date: NaiveDate, day_offset: f64 },
    /// Reachable, but after the configured horizon; speculative.
    BeyondHorizon { date: NaiveDate, day_offset: f64 },
    /// The threshold was already below the curve at the phase start.
    AlreadyReached { date: NaiveDate },
    /// The threshold sits at or below the model's asymptote; the curve never
    /// crosses it.
    Unreachable { floor: f64 },
}

/// One threshold's projection result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crossing {
    pub kind: ThresholdKind,
    /// Threshold concentration (mg/L).
    pub threshold: f64,
    pub outcome: CrossingOutcome,
}

/// Summary stats about the measurements actually used.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_measurements: usize,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub kappa_min: f64,
    pub kappa_max: f64,
    /// Kappa of the most recent measurement.
    pub kappa_latest: f64,
}

/// Resolved run settings: `data.json` settings merged with CLI overrides.
#[derive(Debug, Clone, Copy)]
pub struct RunSpec {
    /// Treatment change date; partitions measurements into phases.
    pub split_date: NaiveDate,
    /// Projection end date (no projection is requested beyond it).
    pub horizon: NaiveDate,
    /// VGPR threshold concentration (mg/L).
    pub vgpr_threshold: f64,
    /// CR threshold concentration (mg/L); deeper, so below VGPR.
    pub cr_threshold: f64,
    pub pre_model: ModelKind,
    pub post_model: ModelKind,
}

/// The `settings` block of `data.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySettings {
    pub split_date: NaiveDate,
    pub projection_end_date: NaiveDate,
    pub vgpr_threshold: f64,
    pub cr_threshold: f64,
    /// Optional per-phase model family overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_model: Option<ModelKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_model: Option<ModelKind>,
}

/// The `data.json` measurement file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFile {
    pub measurements: Vec<Measurement>,
    pub settings: StudySettings,
}

/// One narrative section of `notes.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSection {
    pub title: String,
    /// Lines may contain `{key}` placeholders substituted after projection.
    pub content: Vec<String>,
}

/// The `notes.json` narrative file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesFile {
    pub title: String,
    pub sections: Vec<NoteSection>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub data_path: PathBuf,
    pub notes_path: PathBuf,
    /// Directory the report bundle is written into.
    pub out_dir: PathBuf,

    /// CLI model overrides; `None` falls back to settings, then defaults.
    pub pre_model: Option<ModelKind>,
    pub post_model: Option<ModelKind>,

    /// Solver iteration budget per seed candidate.
    pub max_iterations: usize,

    pub chart_width: u32,
    pub chart_height: u32,
    /// Skip the SVG chart pages (report document only).
    pub no_charts: bool,

    /// Optional per-measurement CSV export.
    pub export_csv: Option<PathBuf>,
}
