//! Deterministic starting points and parameter bounds for the solver.
//!
//! Nonlinear least squares only finds the basin it starts in, so instead of
//! one clever guess we run a small grid of starts derived from the observed
//! data and let the fitter keep the best result. The grid is a pure function
//! of the observations: same data, same seeds, same fit.

use crate::domain::{ModelKind, Phase};

/// Inclusive per-parameter box constraints.
#[derive(Debug, Clone)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    /// Clamp each parameter into its box.
    pub fn clamp(&self, params: &mut [f64]) {
        for (j, p) in params.iter_mut().enumerate() {
            *p = p.clamp(self.lower[j], self.upper[j]);
        }
    }

    /// Bounds for one phase's model, anchored to its observations.
    ///
    /// Both families are pinned to their decay branch:
    /// - Gompertz `A` (the floor) stays below the starting value, `B` stays
    ///   negative, `C` stays positive.
    /// - Exponential `A` stays positive with generous headroom over the data
    ///   and `k` stays positive.
    pub fn for_phase(phase: &Phase) -> ParamBounds {
        let y0 = phase.first_value().unwrap_or(1.0).max(MIN_POSITIVE);
        let y_max = phase.max_value().unwrap_or(1.0).max(MIN_POSITIVE);
        match phase.model_kind {
            ModelKind::Gompertz => ParamBounds {
                lower: vec![MIN_POSITIVE, -20.0, MIN_POSITIVE],
                upper: vec![y0, -MIN_POSITIVE, 1.0],
            },
            ModelKind::Exponential => ParamBounds {
                lower: vec![MIN_POSITIVE, MIN_POSITIVE],
                upper: vec![10.0 * y_max, 1.0],
            },
        }
    }
}

const MIN_POSITIVE: f64 = 1e-6;

/// Decay-rate starts shared by both families (per day).
const RATE_SEEDS: [f64; 5] = [0.005, 0.01, 0.02, 0.05, 0.1];

/// Build the seed grid for one phase.
///
/// Every seed is already inside `ParamBounds::for_phase`, and the order is
/// deterministic so index tie-breaking in the fitter is reproducible.
pub fn seed_grid(phase: &Phase) -> Vec<Vec<f64>> {
    let bounds = ParamBounds::for_phase(phase);
    let y0 = phase.first_value().unwrap_or(1.0).max(MIN_POSITIVE);
    let y_min = phase.min_value().unwrap_or(y0).max(MIN_POSITIVE);
    let y_last = phase.last_value().unwrap_or(y0).max(MIN_POSITIVE);
    let span = phase.span_days().max(1.0);

    let mut seeds = Vec::new();
    match phase.model_kind {
        ModelKind::Gompertz => {
            // Floor guesses below the data, from "decline has stalled" down
            // to "plenty of decline left".
            let floors = [y_last, 0.9 * y_min, 0.5 * y_min, 0.25 * y_min];
            for &a0 in &floors {
                if !(a0 > 0.0 && a0 < y0) {
                    continue;
                }
                // y(0) = a * exp(-b) pins b to the starting value.
                let b0 = -(y0 / a0).ln();
                for &c0 in &RATE_SEEDS {
                    let mut seed = vec![a0, b0, c0];
                    bounds.clamp(&mut seed);
                    seeds.push(seed);
                }
            }
        }
        ModelKind::Exponential => {
            // A rough rate from the observed total decline, then the fixed
            // ladder around it.
            let k_est = if y_last < y0 {
                ((y0 / y_last).ln() / span).clamp(MIN_POSITIVE, 1.0)
            } else {
                0.01
            };
            for &a0 in &[y0, 1.25 * y0] {
                for &k0 in RATE_SEEDS.iter().chain(std::iter::once(&k_est)) {
                    let mut seed = vec![a0, k0];
                    bounds.clamp(&mut seed);
                    seeds.push(seed);
                }
            }
        }
    }
    seeds
}
