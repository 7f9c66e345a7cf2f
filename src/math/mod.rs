//! Numerical building blocks shared by the fitting layer.

pub mod lsq;

pub use lsq::{solve_damped_step, solve_least_squares};
