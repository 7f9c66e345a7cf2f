//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model/phase/threshold enums (`ModelKind`, `PhaseKind`, `ThresholdKind`)
//! - measurement and observation types (`Measurement`, `Observation`, `Phase`)
//! - fit outputs (`FitResult`, `CurveModel`, etc.)
//! - projection outcomes (`Crossing`, `CrossingOutcome`)
//! - file schemas (`DataFile`, `NotesFile`) and run configuration

pub mod types;

pub use types::*;
