//! Phase curve fitting: seed grids, bounds, and the damped solver.

pub mod fitter;
pub mod seed;

pub use fitter::{fit_phase, FitError, FitOptions, DEFAULT_MAX_ITERATIONS, MIN_OBSERVATIONS};
pub use seed::{seed_grid, ParamBounds};
