//! Immutable in-memory telemetry, answering the same queries as the live client.
//!
//! Snapshots can be assembled with the builder methods on [`SessionData`] or
//! loaded from a JSON dump, which makes scoring runs replayable offline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, sync::Arc};

use crate::error::{TelemetryError, TelemetryResult};
use crate::provider::TelemetryProvider;
use crate::types::{
    DriverEntry, DriverNumber, GapSample, PitEvent, PositionHolder, RaceResult, SafetyCarPeriod,
    SessionKey, Stint, TeamRadioRecording,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapStart {
    pub driver_number: DriverNumber,
    pub lap_number: u32,
    pub date_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverGap {
    pub driver_number: DriverNumber,
    pub timestamp: DateTime<Utc>,
    pub gap_to_leader: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub session_key: SessionKey,
    pub year: i32,
    pub is_race: bool,
    pub stints: Vec<Stint>,
    pub lap_starts: Vec<LapStart>,
    pub gaps: Vec<DriverGap>,
    pub pits: Vec<PitEvent>,
    pub positions: Vec<PositionHolder>,
    pub safety_cars: Vec<SafetyCarPeriod>,
    pub drivers: Vec<DriverEntry>,
    pub team_radio: Vec<TeamRadioRecording>,
}

impl SessionData {
    pub fn race(session_key: SessionKey, year: i32) -> Self {
        Self {
            session_key,
            year,
            is_race: true,
            ..Default::default()
        }
    }

    pub fn stint(mut self, driver: DriverNumber, stint_number: u32, lap_start: u32, lap_end: u32) -> Self {
        self.stints.push(Stint {
            driver_number: driver,
            stint_number,
            lap_start: Some(lap_start),
            lap_end: Some(lap_end),
        });
        self
    }

    /// A stint with no recorded final lap.
    pub fn open_stint(mut self, driver: DriverNumber, stint_number: u32, lap_start: u32) -> Self {
        self.stints.push(Stint {
            driver_number: driver,
            stint_number,
            lap_start: Some(lap_start),
            lap_end: None,
        });
        self
    }

    pub fn lap(mut self, driver: DriverNumber, lap_number: u32, date_start: DateTime<Utc>) -> Self {
        self.lap_starts.push(LapStart {
            driver_number: driver,
            lap_number,
            date_start,
        });
        self
    }

    pub fn gap(mut self, driver: DriverNumber, timestamp: DateTime<Utc>, gap_to_leader: f64) -> Self {
        self.gaps.push(DriverGap {
            driver_number: driver,
            timestamp,
            gap_to_leader,
        });
        self
    }

    pub fn pit(mut self, driver: DriverNumber, start: DateTime<Utc>, duration: f64) -> Self {
        self.pits.push(PitEvent {
            driver_number: driver,
            start,
            duration,
        });
        self
    }

    pub fn position(mut self, driver: DriverNumber, position: u32, as_of: DateTime<Utc>) -> Self {
        self.positions.push(PositionHolder {
            position,
            driver_number: driver,
            as_of,
        });
        self
    }

    pub fn safety_car(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.safety_cars.push(SafetyCarPeriod { start, end });
        self
    }

    pub fn driver(mut self, driver: DriverNumber, last_name: &str) -> Self {
        self.drivers.push(DriverEntry {
            driver_number: driver,
            last_name: last_name.to_string(),
            name_acronym: None,
            team_name: None,
        });
        self
    }

    pub fn radio(mut self, driver: DriverNumber, date: DateTime<Utc>, recording_url: &str) -> Self {
        self.team_radio.push(TeamRadioRecording {
            session_key: self.session_key,
            driver_number: driver,
            date,
            recording_url: recording_url.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub sessions: Vec<SessionData>,
}

impl TelemetrySnapshot {
    pub fn new(sessions: Vec<SessionData>) -> Self {
        Self { sessions }
    }

    pub fn load(path: &Path) -> TelemetryResult<Self> {
        let endpoint = path.display().to_string();
        let data = fs::read_to_string(path).map_err(|e| TelemetryError::Unavailable {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| TelemetryError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }

    fn session(&self, key: SessionKey) -> Option<&SessionData> {
        self.sessions.iter().find(|s| s.session_key == key)
    }
}

/// [`TelemetryProvider`] over a shared [`TelemetrySnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    snapshot: Arc<TelemetrySnapshot>,
}

impl SnapshotProvider {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    // Unknown sessions answer like an empty session, the same as the REST API.
    fn with_session<T: Default>(&self, key: SessionKey, f: impl FnOnce(&SessionData) -> T) -> T {
        self.snapshot.session(key).map(f).unwrap_or_default()
    }
}

#[async_trait]
impl TelemetryProvider for SnapshotProvider {
    async fn stints(&self, session: SessionKey, driver: DriverNumber) -> TelemetryResult<Vec<Stint>> {
        Ok(self.with_session(session, |s| {
            let mut stints: Vec<Stint> = s
                .stints
                .iter()
                .filter(|st| st.driver_number == driver)
                .cloned()
                .collect();
            stints.sort_by_key(|st| st.stint_number);
            stints
        }))
    }

    async fn lap_start(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        lap_number: u32,
    ) -> TelemetryResult<Option<DateTime<Utc>>> {
        Ok(self.with_session(session, |s| {
            s.lap_starts
                .iter()
                .find(|l| l.driver_number == driver && l.lap_number == lap_number)
                .map(|l| l.date_start)
        }))
    }

    async fn gap_to_leader_at(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<GapSample>> {
        Ok(self.with_session(session, |s| {
            s.gaps
                .iter()
                .filter(|g| g.driver_number == driver && g.timestamp <= at)
                .max_by_key(|g| g.timestamp)
                .map(|g| GapSample {
                    timestamp: g.timestamp,
                    gap_to_leader: g.gap_to_leader,
                })
        }))
    }

    async fn pit_events(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<PitEvent>> {
        Ok(self.with_session(session, |s| {
            s.pits
                .iter()
                .filter(|p| p.driver_number == driver && p.start >= from && p.start <= to)
                .cloned()
                .collect()
        }))
    }

    async fn position_holder_at(
        &self,
        session: SessionKey,
        position: u32,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<PositionHolder>> {
        Ok(self.with_session(session, |s| {
            s.positions
                .iter()
                .filter(|p| p.position == position && p.as_of <= at)
                .max_by_key(|p| p.as_of)
                .cloned()
        }))
    }

    async fn safety_car_periods(
        &self,
        session: SessionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<SafetyCarPeriod>> {
        Ok(self.with_session(session, |s| {
            s.safety_cars
                .iter()
                .filter(|sc| sc.overlaps(from, to))
                .copied()
                .collect()
        }))
    }

    async fn finishing_position(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Option<RaceResult>> {
        Ok(self.with_session(session, |s| {
            s.positions
                .iter()
                .filter(|p| p.driver_number == driver)
                .max_by_key(|p| p.as_of)
                .map(|p| RaceResult {
                    session_key: session,
                    driver_number: driver,
                    finishing_position: p.position,
                })
        }))
    }

    async fn race_sessions(&self, year: i32) -> TelemetryResult<Vec<SessionKey>> {
        Ok(self
            .snapshot
            .sessions
            .iter()
            .filter(|s| s.is_race && s.year == year)
            .map(|s| s.session_key)
            .collect())
    }

    async fn drivers(&self, session: SessionKey) -> TelemetryResult<Vec<DriverEntry>> {
        Ok(self.with_session(session, |s| s.drivers.clone()))
    }

    async fn team_radio(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Vec<TeamRadioRecording>> {
        Ok(self.with_session(session, |s| {
            let mut radio: Vec<TeamRadioRecording> = s
                .team_radio
                .iter()
                .filter(|r| r.driver_number == driver)
                .cloned()
                .collect();
            radio.sort_by_key(|r| r.date);
            radio
        }))
    }
}
