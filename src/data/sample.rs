//! Synthetic measurement generation for trying the tool without lab data.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{DataFile, Measurement, ModelKind, NoteSection, NotesFile, StudySettings};
use crate::error::{AppError, EXIT_INPUT, EXIT_NUMERIC};
use crate::models::predict;

/// Clean pre-phase curve the noise is layered on. Decays from about
/// 167 mg/L toward a stalled floor of 25.
const PRE_PARAMS: [f64; 3] = [25.0, -1.9, 0.03];

/// Post-phase decay rate per day. The post level starts wherever the pre
/// curve sits on the split day, so the clean series is continuous.
const POST_RATE: f64 = 0.025;

const LAMBDA_BASE: f64 = 1.3;

/// Standard response thresholds for the generated settings (mg/L).
const VGPR_THRESHOLD: f64 = 19.4;
const CR_THRESHOLD: f64 = 5.0;

/// Days past the last measurement the generated horizon extends.
const HORIZON_SLACK_DAYS: i64 = 120;

/// Controls for the synthetic series.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub start: NaiveDate,
    /// Days from `start` to the treatment split.
    pub split_offset_days: i64,
    /// Days from `start` to the last measurement.
    pub end_offset_days: i64,
    /// Measurement cadence in days.
    pub interval_days: i64,
    /// Lognormal noise sigma applied multiplicatively.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 1, 9).unwrap_or_default(),
            split_offset_days: 84,
            end_offset_days: 168,
            interval_days: 14,
            noise: 0.05,
            seed: 7,
        }
    }
}

/// Generate a synthetic `data.json` payload.
///
/// Deterministic: the same config always produces the same series.
pub fn generate_sample(config: &SampleConfig) -> Result<DataFile, AppError> {
    if config.interval_days < 1 {
        return Err(AppError::new(EXIT_INPUT, "Sample interval must be >= 1 day."));
    }
    if config.split_offset_days <= 0 || config.split_offset_days >= config.end_offset_days {
        return Err(AppError::new(
            EXIT_INPUT,
            "Sample split must fall strictly between the start and the last measurement.",
        ));
    }
    if !(config.noise.is_finite() && (0.0..=0.5).contains(&config.noise)) {
        return Err(AppError::new(
            EXIT_INPUT,
            "Sample noise must be a finite sigma in [0, 0.5].",
        ));
    }
    // Each phase needs enough readings to fit (the split day counts toward
    // both).
    if config.split_offset_days < 2 * config.interval_days
        || config.end_offset_days - config.split_offset_days < 2 * config.interval_days
    {
        return Err(AppError::new(
            EXIT_INPUT,
            "Sample span leaves a phase with fewer than 3 measurements.",
        ));
    }

    let mut rng = StdRng::seed_from_u64(sample_seed(config));
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(EXIT_NUMERIC, format!("Noise distribution error: {e}")))?;

    let split = config.split_offset_days;
    let post_level = predict(ModelKind::Gompertz, split as f64, &PRE_PARAMS);

    let mut measurements = Vec::new();
    let mut day = 0;
    while day <= config.end_offset_days {
        let clean = if day <= split {
            predict(ModelKind::Gompertz, day as f64, &PRE_PARAMS)
        } else {
            predict(ModelKind::Exponential, (day - split) as f64, &[post_level, POST_RATE])
        };

        let z: f64 = normal.sample(&mut rng);
        let kappa = round1(clean * (config.noise * z).exp()).max(0.1);
        let zl: f64 = normal.sample(&mut rng);
        let lambda = round1(LAMBDA_BASE * (config.noise * zl).exp()).max(0.1);

        measurements.push(Measurement {
            date: config.start + Duration::days(day),
            kappa,
            lambda,
        });
        day += config.interval_days;
    }

    Ok(DataFile {
        measurements,
        settings: StudySettings {
            split_date: config.start + Duration::days(split),
            projection_end_date: config.start
                + Duration::days(config.end_offset_days + HORIZON_SLACK_DAYS),
            vgpr_threshold: VGPR_THRESHOLD,
            cr_threshold: CR_THRESHOLD,
            pre_model: None,
            post_model: None,
        },
    })
}

/// A starter `notes.json` whose placeholders match what a report run
/// provides.
pub fn starter_notes() -> NotesFile {
    NotesFile {
        title: "Kappa Light Chain Review".to_string(),
        sections: vec![
            NoteSection {
                title: "Current Status".to_string(),
                content: vec![
                    "Latest kappa measurement: {latest_kappa:.1f} mg/L on {latest_date}.".to_string(),
                    "Pre-treatment curve ({pre_model}) projects {proj_pre_final:.1f} mg/L at the horizon."
                        .to_string(),
                ],
            },
            NoteSection {
                title: "Projected Response".to_string(),
                content: vec![
                    "VGPR (<{vgpr} mg/L) expected: {vgpr_date}.".to_string(),
                    "CR (<{cr} mg/L) expected: {cr_date}.".to_string(),
                ],
            },
        ],
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn sample_seed(config: &SampleConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.start.hash(&mut hasher);
    config.split_offset_days.hash(&mut hasher);
    config.end_offset_days.hash(&mut hasher);
    config.interval_days.hash(&mut hasher);
    config.noise.to_bits().hash(&mut hasher);
    config.seed.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_is_deterministic() {
        let config = SampleConfig::default();
        let a = generate_sample(&config).unwrap();
        let b = generate_sample(&config).unwrap();
        assert_eq!(a.measurements, b.measurements);
        assert_eq!(a.settings.split_date, b.settings.split_date);

        let mut other = config.clone();
        other.seed = 8;
        let c = generate_sample(&other).unwrap();
        assert_ne!(a.measurements, c.measurements);
    }

    #[test]
    fn sample_dates_follow_the_cadence() {
        let config = SampleConfig::default();
        let data = generate_sample(&config).unwrap();

        assert_eq!(data.measurements[0].date, config.start);
        for w in data.measurements.windows(2) {
            assert_eq!(w[1].date - w[0].date, Duration::days(config.interval_days));
        }
        // The split lands on a measurement day under the default cadence.
        assert!(data
            .measurements
            .iter()
            .any(|m| m.date == data.settings.split_date));
        assert!(data.settings.projection_end_date > data.measurements.last().unwrap().date);
    }

    #[test]
    fn zero_noise_traces_the_clean_curves() {
        let config = SampleConfig {
            noise: 0.0,
            ..SampleConfig::default()
        };
        let data = generate_sample(&config).unwrap();

        let y0 = predict(ModelKind::Gompertz, 0.0, &PRE_PARAMS);
        assert!((data.measurements[0].kappa - round1(y0)).abs() < 1e-9);

        for w in data.measurements.windows(2) {
            assert!(w[1].kappa < w[0].kappa, "clean series must decrease");
        }
        // The default span carries the clean series through both response
        // thresholds.
        assert!(data.measurements.last().unwrap().kappa < CR_THRESHOLD);
    }

    #[test]
    fn unusable_configs_are_rejected() {
        let mut config = SampleConfig::default();
        config.interval_days = 0;
        assert_eq!(generate_sample(&config).unwrap_err().exit_code(), 2);

        let mut config = SampleConfig::default();
        config.split_offset_days = 200;
        assert_eq!(generate_sample(&config).unwrap_err().exit_code(), 2);

        let mut config = SampleConfig::default();
        config.noise = f64::NAN;
        assert_eq!(generate_sample(&config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn starter_notes_cover_the_standard_keys() {
        let notes = starter_notes();
        assert!(!notes.sections.is_empty());
        let all: String = notes
            .sections
            .iter()
            .flat_map(|s| s.content.iter())
            .cloned()
            .collect();
        for key in ["{latest_kappa", "{vgpr", "{cr", "{vgpr_date}", "{cr_date}"] {
            assert!(all.contains(key), "starter notes should mention {key}");
        }
    }
}
