//! Forward projection of fitted phase curves.
//!
//! Projections are evaluated on a daily grid anchored at the phase start
//! (`t = 0`). Threshold crossings are solved analytically on the fitted
//! curve and then snapped to the first whole day strictly below the
//! threshold, so the reported date never sits on the "equal" side of a
//! boundary.

use chrono::{Duration, NaiveDate};

use crate::domain::{Crossing, CrossingOutcome, PhaseFit, RunSpec, ThresholdKind};
use crate::models::{floor_value, predict, time_to_reach};

/// One day of a projected curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub date: NaiveDate,
    /// Days since the phase start.
    pub t: f64,
    pub value: f64,
}

/// Evaluate the fitted curve on every day from the phase start through
/// `until` inclusive. Empty when `until` precedes the phase start.
pub fn project_phase(fit: &PhaseFit, until: NaiveDate) -> Vec<ProjectedPoint> {
    let days = (until - fit.start).num_days();
    if days < 0 {
        return Vec::new();
    }
    (0..=days)
        .map(|d| {
            let t = d as f64;
            ProjectedPoint {
                date: fit.start + Duration::days(d),
                t,
                value: predict(fit.fit.model.kind, t, &fit.fit.model.params),
            }
        })
        .collect()
}

/// Evaluate the fitted curve at one calendar date.
pub fn value_on(fit: &PhaseFit, date: NaiveDate) -> f64 {
    let t = (date - fit.start).num_days() as f64;
    predict(fit.fit.model.kind, t, &fit.fit.model.params)
}

/// Resolve one threshold against a fitted phase.
pub fn crossing(fit: &PhaseFit, kind: ThresholdKind, threshold: f64, horizon: NaiveDate) -> Crossing {
    let model = &fit.fit.model;
    let outcome = match time_to_reach(model.kind, &model.params, threshold) {
        Err(_) => CrossingOutcome::Unreachable {
            floor: floor_value(model.kind, &model.params),
        },
        Ok(t) if t < 0.0 => CrossingOutcome::AlreadyReached { date: fit.start },
        Ok(t) => {
            // First whole day strictly below the threshold. The floor+1 day
            // works for any fractional offset; when the crossing lands on an
            // exact day boundary the curve only *touches* the threshold
            // there, so step one more day.
            let mut day = t.floor() as i64 + 1;
            if predict(model.kind, day as f64, &model.params) >= threshold {
                day += 1;
            }
            match fit.start.checked_add_signed(Duration::days(day)) {
                // A crossing beyond the representable calendar is never
                // going to be acted on; report it as unreachable.
                None => CrossingOutcome::Unreachable {
                    floor: floor_value(model.kind, &model.params),
                },
                Some(date) if date <= horizon => CrossingOutcome::Reached {
                    date,
                    day_offset: t,
                },
                Some(date) => CrossingOutcome::BeyondHorizon {
                    date,
                    day_offset: t,
                },
            }
        }
    };
    Crossing {
        kind,
        threshold,
        outcome,
    }
}

/// Resolve both response thresholds for the projection phase.
pub fn crossings(fit: &PhaseFit, spec: &RunSpec) -> Vec<Crossing> {
    vec![
        crossing(fit, ThresholdKind::Vgpr, spec.vgpr_threshold, spec.horizon),
        crossing(fit, ThresholdKind::Cr, spec.cr_threshold, spec.horizon),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveModel, FitQuality, FitResult, ModelKind, PhaseKind};

    fn exp_fit(start: NaiveDate, a: f64, k: f64) -> PhaseFit {
        PhaseFit {
            kind: PhaseKind::Post,
            start,
            fit: FitResult {
                model: CurveModel {
                    kind: ModelKind::Exponential,
                    params: vec![a, k],
                },
                quality: FitQuality {
                    sse: 0.0,
                    rmse: 0.0,
                    n: 5,
                    iterations: 1,
                },
            },
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn projection_grid_is_daily_and_inclusive() {
        let fit = exp_fit(d(2025, 3, 10), 100.0, 0.05);
        let points = project_phase(&fit, d(2025, 3, 20));
        assert_eq!(points.len(), 11);
        assert_eq!(points[0].date, d(2025, 3, 10));
        assert_eq!(points[10].date, d(2025, 3, 20));
        assert!((points[0].value - 100.0).abs() < 1e-12);
        for w in points.windows(2) {
            assert_eq!(w[1].date - w[0].date, Duration::days(1));
            assert!(w[1].value < w[0].value);
        }
    }

    #[test]
    fn projection_before_the_phase_start_is_empty() {
        let fit = exp_fit(d(2025, 3, 10), 100.0, 0.05);
        assert!(project_phase(&fit, d(2025, 3, 9)).is_empty());
    }

    #[test]
    fn crossing_snaps_to_the_first_day_strictly_below() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        // ln(100 / 19.4) / 0.05 = 32.8 days, so day 33 is the first whole
        // day under the threshold.
        let c = crossing(&fit, ThresholdKind::Vgpr, 19.4, d(2026, 3, 10));
        match c.outcome {
            CrossingOutcome::Reached { date, day_offset } => {
                assert_eq!(date, d(2025, 4, 12));
                assert!((day_offset - 32.8).abs() < 0.1);
                assert!(value_on(&fit, date) < 19.4);
            }
            other => panic!("expected Reached, got {other:?}"),
        }
    }

    #[test]
    fn exact_boundary_crossings_step_past_the_touch_day() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        // Threshold equal to the day-40 value: the curve touches it at day
        // 40 and is strictly below only from day 41.
        let threshold = value_on(&fit, start + Duration::days(40));
        let c = crossing(&fit, ThresholdKind::Cr, threshold, d(2026, 3, 10));
        match c.outcome {
            CrossingOutcome::Reached { date, .. } => {
                assert_eq!(date, start + Duration::days(41));
            }
            other => panic!("expected Reached, got {other:?}"),
        }
    }

    #[test]
    fn crossing_after_the_horizon_is_flagged_speculative() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        let c = crossing(&fit, ThresholdKind::Vgpr, 19.4, start + Duration::days(20));
        match c.outcome {
            CrossingOutcome::BeyondHorizon { date, day_offset } => {
                assert_eq!(date, d(2025, 4, 12));
                assert!(day_offset > 20.0);
            }
            other => panic!("expected BeyondHorizon, got {other:?}"),
        }
    }

    #[test]
    fn crossing_on_the_horizon_day_still_counts() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        let c = crossing(&fit, ThresholdKind::Vgpr, 19.4, start + Duration::days(33));
        assert!(matches!(c.outcome, CrossingOutcome::Reached { .. }));
    }

    #[test]
    fn threshold_above_the_start_was_already_reached() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        let c = crossing(&fit, ThresholdKind::Vgpr, 150.0, d(2026, 3, 10));
        assert_eq!(c.outcome, CrossingOutcome::AlreadyReached { date: start });
    }

    #[test]
    fn threshold_under_the_floor_is_unreachable() {
        let start = d(2025, 3, 10);
        let fit = PhaseFit {
            kind: PhaseKind::Post,
            start,
            fit: FitResult {
                model: CurveModel {
                    kind: ModelKind::Gompertz,
                    params: vec![9.7, -2.9, 0.03],
                },
                quality: FitQuality {
                    sse: 0.0,
                    rmse: 0.0,
                    n: 4,
                    iterations: 1,
                },
            },
        };
        for threshold in [9.7, 5.0] {
            let c = crossing(&fit, ThresholdKind::Cr, threshold, d(2026, 3, 10));
            match c.outcome {
                CrossingOutcome::Unreachable { floor } => assert!((floor - 9.7).abs() < 1e-12),
                other => panic!("expected Unreachable, got {other:?}"),
            }
        }
    }

    #[test]
    fn both_thresholds_resolve_in_order() {
        let start = d(2025, 3, 10);
        let fit = exp_fit(start, 100.0, 0.05);
        let spec = RunSpec {
            split_date: start,
            horizon: d(2026, 3, 10),
            vgpr_threshold: 19.4,
            cr_threshold: 5.0,
            pre_model: ModelKind::Gompertz,
            post_model: ModelKind::Exponential,
        };
        let all = crossings(&fit, &spec);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, ThresholdKind::Vgpr);
        assert_eq!(all[1].kind, ThresholdKind::Cr);
        let first = match all[0].outcome {
            CrossingOutcome::Reached { date, .. } => date,
            _ => panic!("vgpr should be reached"),
        };
        let second = match all[1].outcome {
            CrossingOutcome::Reached { date, .. } => date,
            _ => panic!("cr should be reached"),
        };
        assert!(second > first, "the deeper threshold crosses later");
    }
}
