//! The query surface the scoring engine needs from a telemetry source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TelemetryResult;
use crate::types::{
    DriverEntry, DriverNumber, GapSample, PitEvent, PositionHolder, RaceResult, SafetyCarPeriod,
    SessionKey, Stint, TeamRadioRecording,
};

/// Read-only, idempotent telemetry queries.
///
/// Every call is a suspension point while the provider answers; implementations
/// must be shareable across concurrently running scoring tasks.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Tyre stints in stint order.
    async fn stints(&self, session: SessionKey, driver: DriverNumber)
        -> TelemetryResult<Vec<Stint>>;

    async fn lap_start(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        lap_number: u32,
    ) -> TelemetryResult<Option<DateTime<Utc>>>;

    /// Most recent numeric gap to leader at or before `at`.
    async fn gap_to_leader_at(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<GapSample>>;

    /// Pit entries with `from <= start <= to`.
    async fn pit_events(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<PitEvent>>;

    /// Driver holding `position` at or before `at`.
    async fn position_holder_at(
        &self,
        session: SessionKey,
        position: u32,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<PositionHolder>>;

    /// Safety-car periods (virtual included) overlapping `[from, to]`.
    async fn safety_car_periods(
        &self,
        session: SessionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<SafetyCarPeriod>>;

    async fn finishing_position(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Option<RaceResult>>;

    /// Race sessions of a season, in calendar order.
    async fn race_sessions(&self, year: i32) -> TelemetryResult<Vec<SessionKey>>;

    async fn drivers(&self, session: SessionKey) -> TelemetryResult<Vec<DriverEntry>>;

    async fn team_radio(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Vec<TeamRadioRecording>>;

    /// Finishing positions across `sessions`, skipping sessions without a result.
    async fn season_results(
        &self,
        sessions: &[SessionKey],
        driver: DriverNumber,
    ) -> TelemetryResult<Vec<RaceResult>> {
        let mut results = Vec::with_capacity(sessions.len());
        for &session in sessions {
            match self.finishing_position(session, driver).await? {
                Some(result) => results.push(result),
                None => tracing::debug!("no result for driver {} in session {}", driver, session),
            }
        }
        Ok(results)
    }
}
