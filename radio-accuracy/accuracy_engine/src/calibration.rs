use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("failed to read calibration at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid calibration JSON at {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid calibration: {0}")]
    Invalid(String),
}

pub const MAX_SAMPLE_COUNT: usize = 60;
pub const MAX_SAMPLE_INTERVAL_SECS: i64 = 3600;
pub const MAX_FINISH_GRACE_SECS: i64 = 3600;

/// Tunable constants of both scorers. Every field has a default, so a partial
/// JSON file only overrides what it names.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Calibration {
    /// Gap samples taken after a statement, the first at the statement itself.
    pub sample_count: usize,
    pub sample_interval_secs: i64,
    /// Added to the start of a driver's last lap to mark the end of their race.
    pub finish_grace_secs: i64,
    /// Per-interval correction for the reference car's pace advantage.
    pub drift_compensation_secs: f64,
    /// |r| expected from an accurate statement. The measured reference value
    /// was 0.432; scoring uses the ideal of 1.0 unless configured otherwise.
    pub expected_correlation_magnitude: f64,
    pub positive_percentile: f64,
    pub negative_percentile: f64,
    pub clamp_post_race: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            sample_count: 6,
            sample_interval_secs: 60,
            finish_grace_secs: 60,
            drift_compensation_secs: -0.2,
            expected_correlation_magnitude: 1.0,
            positive_percentile: 0.25,
            negative_percentile: 0.75,
            clamp_post_race: true,
        }
    }
}

impl Calibration {
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let display = path.display().to_string();
        let data = fs::read_to_string(path).map_err(|source| CalibrationError::Read {
            path: display.clone(),
            source,
        })?;
        let calibration: Self = serde_json::from_str(&data).map_err(|source| {
            CalibrationError::Parse {
                path: display,
                source,
            }
        })?;
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !(2..=MAX_SAMPLE_COUNT).contains(&self.sample_count) {
            return Err(CalibrationError::Invalid(format!(
                "sample_count must lie in [2, {}], got {}",
                MAX_SAMPLE_COUNT, self.sample_count
            )));
        }
        if !(1..=MAX_SAMPLE_INTERVAL_SECS).contains(&self.sample_interval_secs) {
            return Err(CalibrationError::Invalid(format!(
                "sample_interval_secs must lie in [1, {}], got {}",
                MAX_SAMPLE_INTERVAL_SECS, self.sample_interval_secs
            )));
        }
        if !(0..=MAX_FINISH_GRACE_SECS).contains(&self.finish_grace_secs) {
            return Err(CalibrationError::Invalid(format!(
                "finish_grace_secs must lie in [0, {}], got {}",
                MAX_FINISH_GRACE_SECS, self.finish_grace_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.expected_correlation_magnitude) {
            return Err(CalibrationError::Invalid(
                "expected_correlation_magnitude must lie in [0, 1]".to_string(),
            ));
        }
        for p in [self.positive_percentile, self.negative_percentile] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CalibrationError::Invalid(format!(
                    "percentile {} outside [0, 1]",
                    p
                )));
            }
        }
        Ok(())
    }

    /// `t0, t0 + interval, ...`, `sample_count` instants. Values outside the
    /// range `validate` accepts are clamped into it.
    pub fn sample_times(&self, t0: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let step = Duration::seconds(self.sample_interval_secs.clamp(1, MAX_SAMPLE_INTERVAL_SECS));
        let count = i32::try_from(self.sample_count.min(MAX_SAMPLE_COUNT)).unwrap_or(0);
        (0..count).map(|i| t0 + step * i).collect()
    }

    pub fn finish_grace(&self) -> Duration {
        Duration::seconds(self.finish_grace_secs.clamp(0, MAX_FINISH_GRACE_SECS))
    }
}
