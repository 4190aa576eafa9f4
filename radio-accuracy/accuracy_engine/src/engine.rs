use futures::stream::{self, StreamExt};
use std::sync::Arc;
use telemetry_feed::TelemetryProvider;

use crate::calibration::Calibration;
use crate::classification::Classification;
use crate::context::{self, RaceContext};
use crate::error::ScoringError;
use crate::in_race::InRaceScorer;
use crate::post_race::{PostRaceScorer, ReferenceSet};
use crate::statement::{RadioStatement, ScoreResult};

/// Scores radio statements against telemetry.
///
/// Holds only immutable configuration and a shared provider handle; every call
/// is independent and any number may run concurrently.
pub struct AccuracyEngine<P: ?Sized> {
    provider: Arc<P>,
    calibration: Calibration,
    reference: ReferenceSet,
}

impl<P: TelemetryProvider + ?Sized> AccuracyEngine<P> {
    pub fn new(provider: Arc<P>, calibration: Calibration, reference: ReferenceSet) -> Self {
        Self {
            provider,
            calibration,
            reference,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn reference(&self) -> &ReferenceSet {
        &self.reference
    }

    pub async fn score(&self, statement: &RadioStatement) -> Result<ScoreResult, ScoringError> {
        let classification = Classification::parse(&statement.classification)?;
        let polarity = match classification.polarity() {
            Ok(p) => p,
            Err(reason) => return Ok(ScoreResult::NotComputable(reason)),
        };

        let ctx = statement.context();
        let provider = self.provider.as_ref();
        let race_context =
            context::resolve(provider, &ctx, self.calibration.finish_grace()).await?;

        let result = match race_context {
            RaceContext::InRace => {
                InRaceScorer::new(provider, &self.calibration)
                    .score(&ctx, polarity)
                    .await?
            }
            RaceContext::PostRace => {
                PostRaceScorer::new(provider, &self.calibration, &self.reference)
                    .score(&ctx, polarity)
                    .await?
            }
        };
        tracing::info!(
            "{}: {:?} {:?} statement -> {:?}",
            ctx,
            race_context,
            classification.sentiment,
            result
        );
        Ok(result)
    }

    /// Score many statements with at most `workers` in flight. Results come back
    /// in input order.
    pub async fn score_many(
        &self,
        statements: &[RadioStatement],
        workers: usize,
    ) -> Vec<Result<ScoreResult, ScoringError>> {
        let mut scored: Vec<(usize, Result<ScoreResult, ScoringError>)> =
            stream::iter(statements.iter().enumerate())
                .map(|(i, s)| async move { (i, self.score(s).await) })
                .buffer_unordered(workers.max(1))
                .collect()
                .await;
        scored.sort_by_key(|(i, _)| *i);
        scored.into_iter().map(|(_, r)| r).collect()
    }
}
