//! Decides whether a statement was made while the driver was still racing.
//!
//! A driver's race ends at the start of the last lap of their final tyre stint
//! plus a grace period, not at the chequered flag, so radio from a retired car
//! counts as post-race while the session carries on for everyone else.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use telemetry_feed::TelemetryProvider;

use crate::error::{ScoringError, WithinStatement};
use crate::statement::StatementContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceContext {
    InRace,
    PostRace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceFinish {
    pub last_lap: u32,
    pub finished_at: DateTime<Utc>,
}

impl RaceFinish {
    pub fn context_of(&self, timestamp: DateTime<Utc>) -> RaceContext {
        if timestamp > self.finished_at {
            RaceContext::PostRace
        } else {
            RaceContext::InRace
        }
    }
}

pub async fn race_finish<P: TelemetryProvider + ?Sized>(
    provider: &P,
    ctx: &StatementContext,
    grace: Duration,
) -> Result<RaceFinish, ScoringError> {
    let stints = provider
        .stints(ctx.session_key, ctx.driver_number)
        .await
        .within(ctx)?;
    let final_stint = stints
        .iter()
        .max_by_key(|s| s.stint_number)
        .ok_or_else(|| ScoringError::MissingTelemetry {
            what: "tyre stints",
            context: ctx.clone(),
        })?;
    // an earlier stint's end would place the finish too soon
    let last_lap = final_stint.lap_end.ok_or_else(|| ScoringError::MissingTelemetry {
        what: "final lap of last stint",
        context: ctx.clone(),
    })?;

    let lap_start = provider
        .lap_start(ctx.session_key, ctx.driver_number, last_lap)
        .await
        .within(ctx)?
        .ok_or_else(|| ScoringError::MissingTelemetry {
            what: "start time of final lap",
            context: ctx.clone(),
        })?;

    Ok(RaceFinish {
        last_lap,
        finished_at: lap_start + grace,
    })
}

pub async fn resolve<P: TelemetryProvider + ?Sized>(
    provider: &P,
    ctx: &StatementContext,
    grace: Duration,
) -> Result<RaceContext, ScoringError> {
    let finish = race_finish(provider, ctx, grace).await?;
    let context = finish.context_of(ctx.timestamp);
    tracing::debug!(
        "{}: race ends after lap {} at {}, statement is {:?}",
        ctx,
        finish.last_lap,
        finish.finished_at,
        context
    );
    Ok(context)
}
