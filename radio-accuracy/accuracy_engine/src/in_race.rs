//! Scores a statement made during the race against the short-term trend of the
//! driver's gap to the leader.
//!
//! Gaps are sampled once per interval from the statement onwards. A safety car
//! anywhere in that window makes the trend meaningless and the statement is
//! taken as accurate. Otherwise the interval-to-interval differences, corrected
//! for the reference car's pace advantage, are correlated against time and
//! compared with the direction the sentiment implies.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use telemetry_feed::{DriverNumber, TelemetryProvider};

use crate::calibration::Calibration;
use crate::classification::Polarity;
use crate::error::{ScoringError, WithinStatement};
use crate::statement::{NotComputableReason, ScoreResult, StatementContext};
use crate::stats::trend_correlation;

/// Gap samples in time order, tagged with what they measure.
#[derive(Debug, Clone, PartialEq)]
pub enum GapSeries {
    /// The subject's own gap to the race leader.
    ToLeader {
        leader: DriverNumber,
        gaps: Vec<Option<f64>>,
    },
    /// The subject led at the statement, so the chasing car's gap to the
    /// subject is measured instead. Its polarity is opposite to the normal
    /// case and it is differenced in reverse order.
    ChaserInverted {
        chaser: DriverNumber,
        gaps: Vec<Option<f64>>,
    },
}

impl GapSeries {
    /// Car whose pit stops offset the subject's.
    pub fn reference(&self) -> DriverNumber {
        match self {
            Self::ToLeader { leader, .. } => *leader,
            Self::ChaserInverted { chaser, .. } => *chaser,
        }
    }

    /// Seconds to add to every sample to cancel pit time lost in the window.
    /// A subject stop widens its gap to the leader but narrows the chaser's
    /// gap to the subject.
    pub fn pit_offset(&self, subject_pit: f64, reference_pit: f64) -> f64 {
        match self {
            Self::ToLeader { .. } => reference_pit - subject_pit,
            Self::ChaserInverted { .. } => subject_pit - reference_pit,
        }
    }

    /// Valid samples in the order they are differenced.
    pub fn differencing_order(&self) -> Vec<f64> {
        match self {
            Self::ToLeader { gaps, .. } => gaps.iter().flatten().copied().collect(),
            Self::ChaserInverted { gaps, .. } => gaps.iter().rev().flatten().copied().collect(),
        }
    }
}

/// `1 - |expected - r| / 2`, clamped to `[0, 1]`. Positive statements expect the
/// gap to shrink (negative r), negative statements expect it to grow.
pub fn correlation_score(polarity: Polarity, r: f64, expected_magnitude: f64) -> f64 {
    let expected = match polarity {
        Polarity::Positive => -expected_magnitude,
        Polarity::Negative => expected_magnitude,
    };
    let diff = expected - r;
    (1.0 - diff.abs() / 2.0).clamp(0.0, 1.0)
}

/// Successive differences with the drift compensation applied to each.
pub fn drift_corrected_differences(samples: &[f64], drift: f64) -> Vec<f64> {
    samples.windows(2).map(|w| w[1] - w[0] + drift).collect()
}

/// Score a sample series that has already been confound-corrected.
pub fn score_series(samples: &[f64], polarity: Polarity, calibration: &Calibration) -> ScoreResult {
    if samples.len() < 2 {
        return ScoreResult::NotComputable(NotComputableReason::InsufficientSamples {
            valid: samples.len(),
        });
    }
    let diffs = drift_corrected_differences(samples, calibration.drift_compensation_secs);
    match trend_correlation(&diffs) {
        Some(r) => ScoreResult::Score(correlation_score(
            polarity,
            r,
            calibration.expected_correlation_magnitude,
        )),
        None => ScoreResult::NotComputable(NotComputableReason::InsufficientSamples {
            valid: samples.len(),
        }),
    }
}

pub struct InRaceScorer<'a, P: ?Sized> {
    provider: &'a P,
    calibration: &'a Calibration,
}

impl<'a, P: TelemetryProvider + ?Sized> InRaceScorer<'a, P> {
    pub fn new(provider: &'a P, calibration: &'a Calibration) -> Self {
        Self {
            provider,
            calibration,
        }
    }

    pub async fn score(
        &self,
        ctx: &StatementContext,
        polarity: Polarity,
    ) -> Result<ScoreResult, ScoringError> {
        let times = self.calibration.sample_times(ctx.timestamp);
        let (Some(&t0), Some(&t_end)) = (times.first(), times.last()) else {
            return Ok(ScoreResult::NotComputable(
                NotComputableReason::InsufficientSamples { valid: 0 },
            ));
        };

        let safety_cars = self
            .provider
            .safety_car_periods(ctx.session_key, t0, t_end)
            .await
            .within(ctx)?;
        if !safety_cars.is_empty() {
            tracing::info!("{}: safety car in sampling window, scoring as accurate", ctx);
            return Ok(ScoreResult::Score(1.0));
        }

        let series = self.sample_series(ctx, t0, &times).await?;

        let subject_pit = self.pit_time(ctx, ctx.driver_number, t0, t_end).await?;
        let reference_pit = self.pit_time(ctx, series.reference(), t0, t_end).await?;
        // flat window-wide correction, not per sample
        let offset = series.pit_offset(subject_pit, reference_pit);
        let corrected: Vec<f64> = series
            .differencing_order()
            .into_iter()
            .map(|g| g + offset)
            .collect();

        let result = score_series(&corrected, polarity, self.calibration);
        tracing::debug!(
            "{}: {:?} gaps {:?} (pit offset {:.3}) -> {:?}",
            ctx,
            polarity,
            corrected,
            offset,
            result
        );
        Ok(result)
    }

    async fn sample_series(
        &self,
        ctx: &StatementContext,
        t0: DateTime<Utc>,
        times: &[DateTime<Utc>],
    ) -> Result<GapSeries, ScoringError> {
        let leader = self
            .provider
            .position_holder_at(ctx.session_key, 1, t0)
            .await
            .within(ctx)?
            .ok_or_else(|| ScoringError::MissingTelemetry {
                what: "race leader at statement time",
                context: ctx.clone(),
            })?;

        if leader.driver_number != ctx.driver_number {
            let gaps = self.gaps(ctx, ctx.driver_number, times).await?;
            return Ok(GapSeries::ToLeader {
                leader: leader.driver_number,
                gaps,
            });
        }

        let chaser = self
            .provider
            .position_holder_at(ctx.session_key, 2, t0)
            .await
            .within(ctx)?
            .ok_or_else(|| ScoringError::MissingTelemetry {
                what: "second place at statement time",
                context: ctx.clone(),
            })?;
        let gaps = self.gaps(ctx, chaser.driver_number, times).await?;
        Ok(GapSeries::ChaserInverted {
            chaser: chaser.driver_number,
            gaps,
        })
    }

    async fn gaps(
        &self,
        ctx: &StatementContext,
        driver: DriverNumber,
        times: &[DateTime<Utc>],
    ) -> Result<Vec<Option<f64>>, ScoringError> {
        let lookups = times
            .iter()
            .map(|&t| self.provider.gap_to_leader_at(ctx.session_key, driver, t));
        let samples = try_join_all(lookups).await.within(ctx)?;
        Ok(samples
            .into_iter()
            .map(|s| s.map(|g| g.gap_to_leader))
            .collect())
    }

    async fn pit_time(
        &self,
        ctx: &StatementContext,
        driver: DriverNumber,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, ScoringError> {
        let pits = self
            .provider
            .pit_events(ctx.session_key, driver, from, to)
            .await
            .within(ctx)?;
        Ok(pits.iter().map(|p| p.duration).sum())
    }
}
