//! OpenF1 REST client.
//!
//! Every query goes through one retry loop: requests are spaced by a shared
//! [`RequestGate`], 429 and 5xx responses and timeouts back off exponentially,
//! and anything still failing after `max_retries` surfaces as a retriable
//! [`TelemetryError`]. OpenF1 answers 404 for filters that match nothing, which
//! is read as an empty result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use crate::error::{TelemetryError, TelemetryResult};
use crate::provider::TelemetryProvider;
use crate::throttle::RequestGate;
use crate::types::{
    DriverEntry, DriverNumber, GapSample, PitEvent, PositionHolder, RaceResult, SafetyCarPeriod,
    SessionKey, Stint, TeamRadioRecording,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

#[derive(Debug, Clone)]
pub struct OpenF1Config {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Initial backoff, doubled after each failed attempt.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Minimum spacing between any two requests from this client.
    pub min_request_interval: Duration,
    /// How far back an at-or-before gap lookup searches.
    pub gap_lookback: Duration,
}

impl Default for OpenF1Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            min_request_interval: Duration::from_millis(250),
            gap_lookback: Duration::from_secs(5 * 60),
        }
    }
}

// ---------- Raw OpenF1 rows ----------

#[derive(Deserialize, Debug)]
struct StintRow {
    driver_number: u32,
    stint_number: u32,
    lap_start: Option<u32>,
    lap_end: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct LapRow {
    date_start: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
struct IntervalRow {
    date: DateTime<Utc>,
    // number, "+1 LAP" style string, or null
    gap_to_leader: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct PitRow {
    date: DateTime<Utc>,
    driver_number: u32,
    pit_duration: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct PositionRow {
    date: DateTime<Utc>,
    driver_number: u32,
    position: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct RaceControlRow {
    pub(crate) date: DateTime<Utc>,
    pub(crate) message: String,
}

#[derive(Deserialize, Debug)]
struct SessionRow {
    session_key: u32,
    session_name: String,
    date_start: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
struct DriverRow {
    driver_number: u32,
    last_name: Option<String>,
    broadcast_name: Option<String>,
    name_acronym: Option<String>,
    team_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TeamRadioRow {
    date: DateTime<Utc>,
    driver_number: u32,
    session_key: u32,
    recording_url: String,
}

// ---------- Conversions ----------

pub(crate) fn parse_gap(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_start_matches('+').parse().ok(),
        _ => None,
    }
}

fn query_time(t: DateTime<Utc>) -> String {
    // naive UTC; a "+00:00" offset would be read as a space in the query string
    t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Pair race-control messages into periods. A `DEPLOYED` message opens a period;
/// `IN THIS LAP`, `ENDING` or `CLEAR` closes it. Unclosed periods run to the end
/// of time.
pub(crate) fn pair_safety_car_messages(rows: &[RaceControlRow]) -> Vec<SafetyCarPeriod> {
    let mut rows: Vec<&RaceControlRow> = rows.iter().collect();
    rows.sort_by_key(|r| r.date);

    let mut periods = Vec::new();
    let mut open: Option<DateTime<Utc>> = None;
    for row in rows {
        let msg = row.message.to_ascii_uppercase();
        if msg.contains("DEPLOYED") {
            open.get_or_insert(row.date);
        } else if msg.contains("IN THIS LAP") || msg.contains("ENDING") || msg.contains("CLEAR") {
            if let Some(start) = open.take() {
                periods.push(SafetyCarPeriod {
                    start,
                    end: row.date,
                });
            }
        }
    }
    if let Some(start) = open {
        periods.push(SafetyCarPeriod {
            start,
            end: DateTime::<Utc>::MAX_UTC,
        });
    }
    periods
}

// ---------- Client ----------

pub struct OpenF1Client {
    http: reqwest::Client,
    config: OpenF1Config,
    gate: RequestGate,
}

impl OpenF1Client {
    pub fn new(config: OpenF1Config) -> TelemetryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TelemetryError::Unavailable {
                endpoint: config.base_url.clone(),
                reason: e.to_string(),
            })?;
        let gate = RequestGate::new(config.min_request_interval);
        Ok(Self { http, config, gate })
    }

    pub fn config(&self) -> &OpenF1Config {
        &self.config
    }

    /// GET `endpoint?query` with throttling, retry and backoff.
    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, query: &str) -> TelemetryResult<Vec<T>> {
        let url = format!("{}/{}?{}", self.config.base_url.trim_end_matches('/'), endpoint, query);
        let mut backoff = self.config.initial_backoff;
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "openf1: retry {}/{} for {} after {:?}",
                    attempt,
                    self.config.max_retries,
                    endpoint,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.max_backoff);
            }
            self.gate.wait().await;

            let err = match self.http.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Vec<T>>().await.map_err(|e| TelemetryError::Decode {
                            endpoint: endpoint.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Ok(Vec::new());
                    }
                    let err = TelemetryError::Unavailable {
                        endpoint: endpoint.to_string(),
                        reason: format!("HTTP {}", status),
                    };
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(err);
                    }
                    err
                }
                Err(e) if e.is_timeout() => TelemetryError::Timeout {
                    endpoint: endpoint.to_string(),
                },
                Err(e) => TelemetryError::Unavailable {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                },
            };
            tracing::warn!("openf1: {} attempt {} failed: {}", endpoint, attempt + 1, err);
            last_err = Some(err);
        }
        Err(last_err.unwrap_or_else(|| TelemetryError::Unavailable {
            endpoint: endpoint.to_string(),
            reason: "no attempt made".to_string(),
        }))
    }
}

#[async_trait]
impl TelemetryProvider for OpenF1Client {
    async fn stints(&self, session: SessionKey, driver: DriverNumber) -> TelemetryResult<Vec<Stint>> {
        let rows: Vec<StintRow> = self
            .fetch("stints", &format!("session_key={}&driver_number={}", session.0, driver.0))
            .await?;
        // open stints are kept; the resolver decides what a missing lap_end means
        let mut stints: Vec<Stint> = rows
            .into_iter()
            .map(|r| Stint {
                driver_number: DriverNumber(r.driver_number),
                stint_number: r.stint_number,
                lap_start: r.lap_start,
                lap_end: r.lap_end,
            })
            .collect();
        stints.sort_by_key(|s| s.stint_number);
        Ok(stints)
    }

    async fn lap_start(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        lap_number: u32,
    ) -> TelemetryResult<Option<DateTime<Utc>>> {
        let rows: Vec<LapRow> = self
            .fetch(
                "laps",
                &format!(
                    "session_key={}&driver_number={}&lap_number={}",
                    session.0, driver.0, lap_number
                ),
            )
            .await?;
        Ok(rows.into_iter().find_map(|r| r.date_start))
    }

    async fn gap_to_leader_at(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<GapSample>> {
        let lookback = chrono::Duration::from_std(self.config.gap_lookback)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let rows: Vec<IntervalRow> = self
            .fetch(
                "intervals",
                &format!(
                    "session_key={}&driver_number={}&date>={}&date<={}",
                    session.0,
                    driver.0,
                    query_time(at - lookback),
                    query_time(at)
                ),
            )
            .await?;
        Ok(rows
            .iter()
            .filter(|r| r.date <= at)
            .filter_map(|r| {
                parse_gap(&r.gap_to_leader).map(|gap| GapSample {
                    timestamp: r.date,
                    gap_to_leader: gap,
                })
            })
            .max_by_key(|g| g.timestamp))
    }

    async fn pit_events(
        &self,
        session: SessionKey,
        driver: DriverNumber,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<PitEvent>> {
        let rows: Vec<PitRow> = self
            .fetch(
                "pit",
                &format!(
                    "session_key={}&driver_number={}&date>={}&date<={}",
                    session.0,
                    driver.0,
                    query_time(from),
                    query_time(to)
                ),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.date >= from && r.date <= to)
            .map(|r| PitEvent {
                driver_number: DriverNumber(r.driver_number),
                start: r.date,
                // OpenF1 leaves the duration empty for drive-throughs it could not time
                duration: r.pit_duration.unwrap_or(0.0),
            })
            .collect())
    }

    async fn position_holder_at(
        &self,
        session: SessionKey,
        position: u32,
        at: DateTime<Utc>,
    ) -> TelemetryResult<Option<PositionHolder>> {
        let rows: Vec<PositionRow> = self
            .fetch(
                "position",
                &format!("session_key={}&position={}&date<={}", session.0, position, query_time(at)),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.date <= at)
            .max_by_key(|r| r.date)
            .map(|r| PositionHolder {
                position: r.position,
                driver_number: DriverNumber(r.driver_number),
                as_of: r.date,
            }))
    }

    async fn safety_car_periods(
        &self,
        session: SessionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<SafetyCarPeriod>> {
        let rows: Vec<RaceControlRow> = self
            .fetch("race_control", &format!("session_key={}&category=SafetyCar", session.0))
            .await?;
        Ok(pair_safety_car_messages(&rows)
            .into_iter()
            .filter(|p| p.overlaps(from, to))
            .collect())
    }

    async fn finishing_position(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Option<RaceResult>> {
        let rows: Vec<PositionRow> = self
            .fetch("position", &format!("session_key={}&driver_number={}", session.0, driver.0))
            .await?;
        Ok(rows.into_iter().max_by_key(|r| r.date).map(|r| RaceResult {
            session_key: session,
            driver_number: driver,
            finishing_position: r.position,
        }))
    }

    async fn race_sessions(&self, year: i32) -> TelemetryResult<Vec<SessionKey>> {
        let mut rows: Vec<SessionRow> = self
            .fetch("sessions", &format!("session_type=Race&year={}", year))
            .await?;
        // sprints share the Race session type
        rows.retain(|r| r.session_name == "Race");
        rows.sort_by_key(|r| r.date_start);
        Ok(rows.into_iter().map(|r| SessionKey(r.session_key)).collect())
    }

    async fn drivers(&self, session: SessionKey) -> TelemetryResult<Vec<DriverEntry>> {
        let rows: Vec<DriverRow> = self
            .fetch("drivers", &format!("session_key={}", session.0))
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| DriverEntry {
                driver_number: DriverNumber(r.driver_number),
                last_name: r
                    .last_name
                    .or(r.broadcast_name)
                    .unwrap_or_else(|| format!("Driver{}", r.driver_number)),
                name_acronym: r.name_acronym,
                team_name: r.team_name,
            })
            .collect())
    }

    async fn team_radio(
        &self,
        session: SessionKey,
        driver: DriverNumber,
    ) -> TelemetryResult<Vec<TeamRadioRecording>> {
        let rows: Vec<TeamRadioRow> = self
            .fetch("team_radio", &format!("session_key={}&driver_number={}", session.0, driver.0))
            .await?;
        let mut radio: Vec<TeamRadioRecording> = rows
            .into_iter()
            .map(|r| TeamRadioRecording {
                session_key: SessionKey(r.session_key),
                driver_number: DriverNumber(r.driver_number),
                date: r.date,
                recording_url: r.recording_url,
            })
            .collect();
        radio.sort_by_key(|r| r.date);
        Ok(radio)
    }
}
