//! Scores a statement made after the driver's race against how unusual their
//! result was relative to a reference season.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use telemetry_feed::{SessionKey, TelemetryProvider, TelemetryResult};

use crate::calibration::Calibration;
use crate::classification::Polarity;
use crate::error::{ScoringError, WithinStatement};
use crate::statement::{ScoreResult, StatementContext};
use crate::stats::{mean, round_to, std_dev};

/// Fixed set of sessions a driver's finishing history is drawn from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    sessions: Vec<SessionKey>,
}

impl ReferenceSet {
    pub fn new(sessions: Vec<SessionKey>) -> Self {
        Self { sessions }
    }

    /// Every race session of `year`.
    pub async fn for_season<P: TelemetryProvider + ?Sized>(
        provider: &P,
        year: i32,
    ) -> TelemetryResult<Self> {
        let sessions = provider.race_sessions(year).await?;
        tracing::info!("reference set: {} races from {}", sessions.len(), year);
        Ok(Self::new(sessions))
    }

    pub fn sessions(&self) -> &[SessionKey] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Normal distribution fitted to historical finishing positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionDistribution {
    pub mean: f64,
    pub std_dev: f64,
    pub samples: usize,
}

impl PositionDistribution {
    /// `None` with fewer than two positions or zero spread.
    pub fn fit(positions: &[u32]) -> Option<Self> {
        let xs: Vec<f64> = positions.iter().map(|&p| p as f64).collect();
        let mean = mean(&xs)?;
        let std_dev = std_dev(&xs)?;
        if xs.len() < 2 || std_dev <= 0.0 {
            return None;
        }
        Some(Self {
            mean,
            std_dev,
            samples: xs.len(),
        })
    }

    /// Cumulative probability of `position`, inverted when the position beats
    /// the mean (a lower number is a better result).
    pub fn performance_percentile(&self, position: u32) -> Option<f64> {
        let normal = Normal::new(self.mean, self.std_dev).ok()?;
        let x = position as f64;
        let p = normal.cdf(x);
        Some(if x < self.mean { 1.0 - p } else { p })
    }
}

/// `round(1 - |expected - actual|, 3)`, optionally clamped to `[0, 1]`.
pub fn percentile_score(polarity: Polarity, actual: f64, calibration: &Calibration) -> f64 {
    let expected = match polarity {
        Polarity::Positive => calibration.positive_percentile,
        Polarity::Negative => calibration.negative_percentile,
    };
    let score = round_to(1.0 - (expected - actual).abs(), 3);
    if calibration.clamp_post_race {
        score.clamp(0.0, 1.0)
    } else {
        score
    }
}

pub struct PostRaceScorer<'a, P: ?Sized> {
    provider: &'a P,
    calibration: &'a Calibration,
    reference: &'a ReferenceSet,
}

impl<'a, P: TelemetryProvider + ?Sized> PostRaceScorer<'a, P> {
    pub fn new(provider: &'a P, calibration: &'a Calibration, reference: &'a ReferenceSet) -> Self {
        Self {
            provider,
            calibration,
            reference,
        }
    }

    pub async fn score(
        &self,
        ctx: &StatementContext,
        polarity: Polarity,
    ) -> Result<ScoreResult, ScoringError> {
        let current = self
            .provider
            .finishing_position(ctx.session_key, ctx.driver_number)
            .await
            .within(ctx)?
            .ok_or_else(|| ScoringError::MissingTelemetry {
                what: "finishing position",
                context: ctx.clone(),
            })?;

        let history: Vec<u32> = self
            .provider
            .season_results(self.reference.sessions(), ctx.driver_number)
            .await
            .within(ctx)?
            .iter()
            .map(|r| r.finishing_position)
            .collect();

        let insufficient = || {
            let xs: Vec<f64> = history.iter().map(|&p| p as f64).collect();
            ScoringError::InsufficientHistory {
                driver: ctx.driver_number,
                samples: history.len(),
                std_dev: std_dev(&xs).unwrap_or(0.0),
                context: ctx.clone(),
            }
        };
        let dist = PositionDistribution::fit(&history).ok_or_else(insufficient)?;
        let actual = dist
            .performance_percentile(current.finishing_position)
            .ok_or_else(insufficient)?;

        let score = percentile_score(polarity, actual, self.calibration);
        tracing::debug!(
            "{}: finished P{} vs mean {:.2} (sd {:.2}, n={}), percentile {:.3} -> {}",
            ctx,
            current.finishing_position,
            dist.mean,
            dist.std_dev,
            dist.samples,
            actual,
            score
        );
        Ok(ScoreResult::Score(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_rejects_degenerate_history() {
        assert!(PositionDistribution::fit(&[]).is_none());
        assert!(PositionDistribution::fit(&[4]).is_none());
        assert!(PositionDistribution::fit(&[3, 3, 3, 3]).is_none());
        let d = PositionDistribution::fit(&[2, 4]).unwrap();
        assert_eq!((d.mean, d.std_dev, d.samples), (3.0, 1.0, 2));
    }

    #[test]
    fn test_percentile_orientation() {
        let d = PositionDistribution::fit(&[4, 5, 6, 5, 4, 6, 5, 5, 4, 6]).unwrap();
        let win = d.performance_percentile(1).unwrap();
        assert!(win > 0.999, "beating every result should be near 1, got {}", win);
        let at_mean = d.performance_percentile(5).unwrap();
        assert!((at_mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_positive_result_scores_a_quarter() {
        let d = PositionDistribution::fit(&[4, 5, 6, 5, 4, 6, 5, 5, 4, 6]).unwrap();
        let actual = d.performance_percentile(1).unwrap();
        let score = percentile_score(Polarity::Positive, actual, &Calibration::default());
        assert_eq!(score, 0.25);
    }

    #[test]
    fn test_negative_expectation_uses_bottom_quartile() {
        let c = Calibration::default();
        assert_eq!(percentile_score(Polarity::Negative, 0.75, &c), 1.0);
        assert_eq!(percentile_score(Polarity::Negative, 0.5, &c), 0.75);
        assert_eq!(percentile_score(Polarity::Positive, 0.5, &c), 0.75);
    }
}
