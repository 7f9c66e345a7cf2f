//! Command-line parsing for the free light chain report tool.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::ModelKind;
use crate::fit::DEFAULT_MAX_ITERATIONS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "flc", version, about = "Free light chain decay fitting and reporting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit both phases and write the report bundle (Markdown document plus SVG chart pages).
    Report(RunArgs),
    /// Fit both phases and print diagnostics only (useful for scripting).
    Fit(RunArgs),
    /// Print projected threshold crossings and the post-phase daily projection.
    Project(RunArgs),
    /// Append one measurement to the data file, keeping dates ordered.
    Add(AddArgs),
    /// Write a synthetic data.json and a starter notes.json.
    Sample(SampleArgs),
}

/// Common options for runs that fit the curves.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Measurement file.
    #[arg(long, default_value = "data.json")]
    pub data: PathBuf,

    /// Notes file with placeholder templates.
    #[arg(long, default_value = "notes.json")]
    pub notes: PathBuf,

    /// Directory the report bundle is written into.
    #[arg(short = 'o', long, default_value = ".")]
    pub out: PathBuf,

    /// Override the pre-phase model family.
    #[arg(long, value_enum)]
    pub pre_model: Option<ModelKind>,

    /// Override the post-phase model family.
    #[arg(long, value_enum)]
    pub post_model: Option<ModelKind>,

    /// Solver iteration budget per seed candidate.
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Chart width in pixels.
    #[arg(long, default_value_t = 750)]
    pub chart_width: u32,

    /// Chart height in pixels.
    #[arg(long, default_value_t = 550)]
    pub chart_height: u32,

    /// Skip the SVG chart pages (report document only).
    #[arg(long)]
    pub no_charts: bool,

    /// Export per-measurement rows (phase, fitted value, residual) to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for appending a measurement.
#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Measurement date (YYYY-MM-DD).
    #[arg(value_name = "DATE")]
    pub date: NaiveDate,

    /// Kappa free light chain concentration (mg/L).
    #[arg(value_name = "KAPPA")]
    pub kappa: f64,

    /// Lambda free light chain concentration (mg/L).
    #[arg(value_name = "LAMBDA")]
    pub lambda: f64,

    /// Measurement file.
    #[arg(long, default_value = "data.json")]
    pub data: PathBuf,
}

/// Options for generating a synthetic dataset.
#[derive(Debug, Parser)]
pub struct SampleArgs {
    /// Directory the generated files are written into.
    #[arg(short = 'o', long, default_value = ".")]
    pub out: PathBuf,

    /// First measurement date.
    #[arg(long, default_value = "2025-01-09")]
    pub start: NaiveDate,

    /// Days from the start to the treatment split.
    #[arg(long, default_value_t = 84)]
    pub split_days: i64,

    /// Days from the start to the last measurement.
    #[arg(long, default_value_t = 168)]
    pub end_days: i64,

    /// Measurement cadence in days.
    #[arg(long, default_value_t = 14)]
    pub interval_days: i64,

    /// Multiplicative lognormal noise sigma.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}
