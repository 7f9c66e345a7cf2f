//! Nonlinear least squares fitting for a single phase.
//!
//! Given a phase's observations `(t_i, y_i)` and its model family, we run a
//! damped Gauss-Newton (Levenberg-Marquardt) iteration from every start in
//! the deterministic seed grid:
//!
//! - build the Jacobian and residuals at the current parameters
//! - solve a damped step, clamp it into the parameter box
//! - accept the step only when it lowers the SSE, otherwise raise the damping
//!
//! and return the best (lowest SSE) converged candidate, rejected if its
//! shape is not a usable decay.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{CurveModel, FitQuality, FitResult, ModelKind, Phase, PhaseKind};
use crate::error::{AppError, EXIT_DATA, EXIT_NUMERIC};
use crate::fit::seed::{seed_grid, ParamBounds};
use crate::math::solve_damped_step;
use crate::models::{fill_jacobian_row, is_degenerate_decay, predict};

/// Fewest observations a phase may carry and still be fit.
pub const MIN_OBSERVATIONS: usize = 3;

/// Default per-seed iteration budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

const INITIAL_LAMBDA: f64 = 1e-3;
const LAMBDA_FACTOR: f64 = 10.0;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e10;
const MAX_LAMBDA_STEPS: usize = 12;
const SSE_TOL: f64 = 1e-12;
const STEP_TOL: f64 = 1e-9;

/// Fitting options that affect how each phase is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Iteration budget per seed candidate.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Why a phase could not be fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Too few observations to constrain the model.
    InsufficientData {
        phase: PhaseKind,
        got: usize,
        min: usize,
    },
    /// The solver produced no usable decay fit.
    Divergence { phase: PhaseKind, detail: String },
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::InsufficientData { phase, got, min } => write!(
                f,
                "{} phase has {got} measurement(s); at least {min} are required to fit a curve",
                phase.display_name()
            ),
            FitError::Divergence { phase, detail } => {
                write!(f, "{} phase fit did not converge: {detail}", phase.display_name())
            }
        }
    }
}

impl std::error::Error for FitError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InsufficientData { .. } => EXIT_DATA,
            FitError::Divergence { .. } => EXIT_NUMERIC,
        };
        AppError::new(code, err.to_string())
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: Vec<f64>,
    sse: f64,
    iterations: usize,
}

/// Fit one phase's model to its observations.
pub fn fit_phase(phase: &Phase, opts: &FitOptions) -> Result<FitResult, FitError> {
    let n = phase.n();
    if n < MIN_OBSERVATIONS {
        return Err(FitError::InsufficientData {
            phase: phase.kind,
            got: n,
            min: MIN_OBSERVATIONS,
        });
    }
    debug_assert!(
        phase.observations.windows(2).all(|w| w[0].t < w[1].t),
        "phase time offsets must be strictly increasing"
    );
    if phase
        .observations
        .iter()
        .any(|o| !o.t.is_finite() || !o.value.is_finite())
    {
        return Err(FitError::Divergence {
            phase: phase.kind,
            detail: "non-finite observation".to_string(),
        });
    }

    let kind = phase.model_kind;
    let bounds = ParamBounds::for_phase(phase);
    let seeds = seed_grid(phase);
    if seeds.is_empty() {
        return Err(FitError::Divergence {
            phase: phase.kind,
            detail: format!("no usable starting points for {}", kind.display_name()),
        });
    }

    // Evaluate each start independently (parallel).
    let candidates: Vec<Candidate> = seeds
        .par_iter()
        .enumerate()
        .filter_map(|(idx, seed)| {
            levenberg_marquardt(kind, phase, seed, &bounds, opts.max_iterations).map(
                |(params, sse, iterations)| Candidate {
                    idx,
                    params,
                    sse,
                    iterations,
                },
            )
        })
        .collect();

    if candidates.is_empty() {
        return Err(FitError::Divergence {
            phase: phase.kind,
            detail: format!("every {} start diverged", kind.display_name()),
        });
    }

    // Deterministic selection: pick the minimum SSE; break ties by seed index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
            best = c;
        }
    }

    if is_degenerate_decay(kind, &best.params, phase.span_days()) {
        return Err(FitError::Divergence {
            phase: phase.kind,
            detail: format!(
                "best {} candidate is not a decreasing decay",
                kind.display_name()
            ),
        });
    }

    let rmse = (best.sse / n as f64).sqrt();
    Ok(FitResult {
        model: CurveModel {
            kind,
            params: best.params.clone(),
        },
        quality: FitQuality {
            sse: best.sse,
            rmse,
            n,
            iterations: best.iterations,
        },
    })
}

/// Run the damped iteration from one seed.
///
/// Returns the final parameters, their SSE, and the iterations spent, or
/// `None` when the seed never produces a finite evaluation. A stall (no
/// damping level improves the SSE) ends the iteration; the stalled point is
/// still a valid candidate and competes on its SSE.
fn levenberg_marquardt(
    kind: ModelKind,
    phase: &Phase,
    seed: &[f64],
    bounds: &ParamBounds,
    max_iterations: usize,
) -> Option<(Vec<f64>, f64, usize)> {
    let obs = &phase.observations;
    let n = obs.len();
    let k = kind.param_count();

    let mut params = seed.to_vec();
    bounds.clamp(&mut params);
    let mut sse = sse_of(kind, phase, &params);
    if !sse.is_finite() {
        return None;
    }

    let mut jacobian = DMatrix::<f64>::zeros(n, k);
    let mut residuals = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; k];

    let mut lambda = INITIAL_LAMBDA;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        for (i, o) in obs.iter().enumerate() {
            fill_jacobian_row(kind, o.t, &params, &mut row);
            for j in 0..k {
                jacobian[(i, j)] = row[j];
            }
            residuals[i] = o.value - predict(kind, o.t, &params);
        }
        if jacobian.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let scale = column_scales(&jacobian);

        let mut accepted = false;
        for _ in 0..MAX_LAMBDA_STEPS {
            let Some(delta) = solve_damped_step(&jacobian, &residuals, lambda, &scale) else {
                lambda *= LAMBDA_FACTOR;
                continue;
            };

            let mut trial: Vec<f64> = params
                .iter()
                .zip(delta.iter())
                .map(|(p, d)| p + d)
                .collect();
            bounds.clamp(&mut trial);
            let trial_sse = sse_of(kind, phase, &trial);

            if trial_sse.is_finite() && trial_sse < sse {
                let rel_drop = (sse - trial_sse) / sse.max(f64::MIN_POSITIVE);
                let step: f64 = params
                    .iter()
                    .zip(trial.iter())
                    .map(|(p, q)| (q - p) * (q - p))
                    .sum::<f64>()
                    .sqrt();
                let pnorm: f64 = trial.iter().map(|p| p * p).sum::<f64>().sqrt();

                params = trial;
                sse = trial_sse;
                lambda = (lambda / LAMBDA_FACTOR).max(MIN_LAMBDA);
                accepted = true;

                if rel_drop < SSE_TOL && step < STEP_TOL * (1.0 + pnorm) {
                    return Some((params, sse, iterations));
                }
                break;
            }

            lambda *= LAMBDA_FACTOR;
            if lambda > MAX_LAMBDA {
                break;
            }
        }

        if !accepted {
            break;
        }
    }

    Some((params, sse, iterations))
}

fn sse_of(kind: ModelKind, phase: &Phase, params: &[f64]) -> f64 {
    phase
        .observations
        .iter()
        .map(|o| {
            let r = o.value - predict(kind, o.t, params);
            r * r
        })
        .sum()
}

/// Per-column damping scales: the column norm, floored so a vanishing
/// gradient direction never zeroes its own damping.
fn column_scales(jacobian: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        jacobian.ncols(),
        jacobian.column_iter().map(|c| c.norm().max(1e-12)),
    )
}
