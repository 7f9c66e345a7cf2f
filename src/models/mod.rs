//! Decay model evaluation, derivatives, and inversion.

pub mod model;

pub use model::{
    fill_jacobian_row, floor_value, is_degenerate_decay, predict, time_to_reach, InvertError,
};
