//! Closed-form evaluation and inversion of the supported decay models.
//!
//! Both families are written in their decay convention:
//!
//! * Gompertz: `y(t) = A * exp(-B * exp(-C * t))` with `A > 0`, `B < 0`,
//!   `C > 0`. The curve starts at `A * exp(-B)` and falls toward the
//!   asymptote `A`.
//! * Exponential: `y(t) = A * exp(-k * t)` with `A > 0`, `k > 0`. The
//!   curve starts at `A` and falls toward zero.
//!
//! `t` is measured in days since the start of the phase being modelled.

use crate::domain::ModelKind;
use crate::error::{AppError, EXIT_NUMERIC};

/// Evaluate a model at day offset `t`.
pub fn predict(kind: ModelKind, t: f64, params: &[f64]) -> f64 {
    match kind {
        ModelKind::Gompertz => {
            let (a, b, c) = (params[0], params[1], params[2]);
            a * (-b * (-c * t).exp()).exp()
        }
        ModelKind::Exponential => {
            let (a, k) = (params[0], params[1]);
            a * (-k * t).exp()
        }
    }
}

/// Fill one Jacobian row: partial derivatives of `predict` with respect to
/// each parameter, evaluated at day offset `t`.
///
/// `row` must have length `kind.param_count()`.
pub fn fill_jacobian_row(kind: ModelKind, t: f64, params: &[f64], row: &mut [f64]) {
    match kind {
        ModelKind::Gompertz => {
            let (a, b, c) = (params[0], params[1], params[2]);
            let e = (-c * t).exp();
            let g = (-b * e).exp();
            let y = a * g;
            row[0] = g;
            row[1] = -y * e;
            row[2] = y * b * t * e;
        }
        ModelKind::Exponential => {
            let (a, k) = (params[0], params[1]);
            let e = (-k * t).exp();
            row[0] = e;
            row[1] = -t * a * e;
        }
    }
}

/// The lowest value a fitted curve can approach as `t` grows without bound.
pub fn floor_value(kind: ModelKind, params: &[f64]) -> f64 {
    match kind {
        ModelKind::Gompertz => params[0],
        ModelKind::Exponential => 0.0,
    }
}

/// Solve `predict(kind, t, params) == value` for `t`.
///
/// Returns the exact (possibly negative) day offset at which a decreasing
/// curve passes through `value`. A negative offset means the curve was
/// already below `value` at the start of the phase.
///
/// Fails when `value` lies at or below the curve's floor, where no finite
/// crossing exists, or when the parameters make an intermediate logarithm
/// ill-defined.
pub fn time_to_reach(kind: ModelKind, params: &[f64], value: f64) -> Result<f64, InvertError> {
    let floor = floor_value(kind, params);
    let unreachable = InvertError::ThresholdUnreachable {
        threshold: value,
        floor,
    };
    match kind {
        ModelKind::Gompertz => {
            let (a, b, c) = (params[0], params[1], params[2]);
            if !(value > a) || a <= 0.0 || c <= 0.0 {
                return Err(unreachable);
            }
            // ln(value / a) > 0, so the inner ratio is positive only for b < 0.
            let inner = -(value / a).ln() / b;
            if inner <= 0.0 || !inner.is_finite() {
                return Err(unreachable);
            }
            Ok(-inner.ln() / c)
        }
        ModelKind::Exponential => {
            let (a, k) = (params[0], params[1]);
            if value <= 0.0 || a <= 0.0 || k <= 0.0 {
                return Err(unreachable);
            }
            Ok((a / value).ln() / k)
        }
    }
}

const MONOTONE_SAMPLES: usize = 25;
const MONOTONE_EPS: f64 = 1e-9;
/// Minimum relative fall across the span for a fit to count as a decay.
const FLAT_FRACTION: f64 = 1e-3;

/// Check a fitted curve for degenerate shape over `[0, span_days]`.
///
/// A decay fit is degenerate when it produces a non-finite value, rises
/// anywhere on the sampled grid, or is flat to within `FLAT_FRACTION` of its
/// starting value across the whole span. Such fits describe the data
/// numerically but not the process, so callers reject them rather than
/// projecting from them.
pub fn is_degenerate_decay(kind: ModelKind, params: &[f64], span_days: f64) -> bool {
    let span = span_days.max(1.0);
    let mut prev = predict(kind, 0.0, params);
    if !prev.is_finite() {
        return true;
    }
    let first = prev;
    for i in 1..MONOTONE_SAMPLES {
        let t = span * i as f64 / (MONOTONE_SAMPLES - 1) as f64;
        let y = predict(kind, t, params);
        if !y.is_finite() || y - prev > MONOTONE_EPS {
            return true;
        }
        prev = y;
    }
    // prev now holds y(span); a flat curve is as useless as a rising one.
    first - prev <= FLAT_FRACTION * first.abs().max(1.0)
}

/// Inversion failure: the requested value can never be crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvertError {
    ThresholdUnreachable { threshold: f64, floor: f64 },
}

impl std::fmt::Display for InvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvertError::ThresholdUnreachable { threshold, floor } => write!(
                f,
                "threshold {threshold} is at or below the fitted floor {floor:.4}; the curve never crosses it"
            ),
        }
    }
}

impl std::error::Error for InvertError {}

impl From<InvertError> for AppError {
    fn from(err: InvertError) -> Self {
        AppError::new(EXIT_NUMERIC, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOMPERTZ: [f64; 3] = [9.7, -2.9, 0.03];
    const EXPONENTIAL: [f64; 2] = [84.0, 0.04];

    #[test]
    fn gompertz_starts_at_a_exp_minus_b() {
        let y0 = predict(ModelKind::Gompertz, 0.0, &GOMPERTZ);
        let expected = GOMPERTZ[0] * (-GOMPERTZ[1]).exp();
        assert!((y0 - expected).abs() < 1e-12);
        assert!(y0 > GOMPERTZ[0]);
    }

    #[test]
    fn both_families_decrease_toward_their_floor() {
        for (kind, params, floor) in [
            (ModelKind::Gompertz, &GOMPERTZ[..], 9.7),
            (ModelKind::Exponential, &EXPONENTIAL[..], 0.0),
        ] {
            let mut prev = predict(kind, 0.0, params);
            for day in 1..400 {
                let y = predict(kind, day as f64, params);
                assert!(y < prev, "{kind:?} rose at day {day}");
                assert!(y > floor, "{kind:?} undershot its floor at day {day}");
                prev = y;
            }
            assert!((floor_value(kind, params) - floor).abs() < 1e-12);
        }
    }

    #[test]
    fn jacobian_rows_match_finite_differences() {
        let h = 1e-6;
        for (kind, params) in [
            (ModelKind::Gompertz, GOMPERTZ.to_vec()),
            (ModelKind::Exponential, EXPONENTIAL.to_vec()),
        ] {
            for t in [0.0, 7.5, 42.0, 180.0] {
                let mut row = vec![0.0; params.len()];
                fill_jacobian_row(kind, t, &params, &mut row);
                for j in 0..params.len() {
                    let mut up = params.clone();
                    let mut dn = params.clone();
                    up[j] += h;
                    dn[j] -= h;
                    let numeric =
                        (predict(kind, t, &up) - predict(kind, t, &dn)) / (2.0 * h);
                    let scale = numeric.abs().max(1.0);
                    assert!(
                        (row[j] - numeric).abs() / scale < 1e-4,
                        "{kind:?} d/dp{j} at t={t}: analytic {} vs numeric {numeric}",
                        row[j]
                    );
                }
            }
        }
    }

    #[test]
    fn inversion_round_trips_through_predict() {
        let value = 19.4;
        let t = time_to_reach(ModelKind::Gompertz, &GOMPERTZ, value).unwrap();
        assert!(t > 0.0);
        assert!((predict(ModelKind::Gompertz, t, &GOMPERTZ) - value).abs() < 1e-9);

        let t = time_to_reach(ModelKind::Exponential, &EXPONENTIAL, value).unwrap();
        assert!(t > 0.0);
        assert!((predict(ModelKind::Exponential, t, &EXPONENTIAL) - value).abs() < 1e-9);
    }

    #[test]
    fn threshold_at_or_below_the_floor_is_unreachable() {
        for threshold in [9.7, 5.0, 0.0, -1.0] {
            let err = time_to_reach(ModelKind::Gompertz, &GOMPERTZ, threshold).unwrap_err();
            let InvertError::ThresholdUnreachable { floor, .. } = err;
            assert!((floor - 9.7).abs() < 1e-12);
        }
        assert!(time_to_reach(ModelKind::Exponential, &EXPONENTIAL, 0.0).is_err());
        assert!(time_to_reach(ModelKind::Exponential, &EXPONENTIAL, -3.0).is_err());
    }

    #[test]
    fn value_above_the_start_yields_a_negative_offset() {
        let y0 = predict(ModelKind::Gompertz, 0.0, &GOMPERTZ);
        let t = time_to_reach(ModelKind::Gompertz, &GOMPERTZ, y0 * 1.5).unwrap();
        assert!(t < 0.0);

        let t = time_to_reach(ModelKind::Exponential, &EXPONENTIAL, 100.0).unwrap();
        assert!(t < 0.0);
    }

    #[test]
    fn rising_and_flat_curves_are_degenerate() {
        // B > 0 flips the Gompertz curve into growth.
        assert!(is_degenerate_decay(
            ModelKind::Gompertz,
            &[9.7, 2.9, 0.03],
            90.0
        ));
        // k = 0 freezes the exponential at its starting value.
        assert!(is_degenerate_decay(
            ModelKind::Exponential,
            &[84.0, 0.0],
            90.0
        ));
        // Decay so slow it is flat for every practical purpose.
        assert!(is_degenerate_decay(
            ModelKind::Exponential,
            &[84.0, 1e-6],
            90.0
        ));
        assert!(!is_degenerate_decay(ModelKind::Gompertz, &GOMPERTZ, 90.0));
        assert!(!is_degenerate_decay(
            ModelKind::Exponential,
            &EXPONENTIAL,
            90.0
        ));
    }
}
