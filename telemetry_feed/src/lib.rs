//! Telemetry queries for radio accuracy scoring: the data model, the
//! [`TelemetryProvider`] seam, a throttled OpenF1 client and a replayable
//! in-memory snapshot.

pub mod error;
pub mod openf1;
pub mod provider;
pub mod snapshot;
pub mod throttle;
pub mod types;

pub use error::{TelemetryError, TelemetryResult};
pub use openf1::{OpenF1Client, OpenF1Config};
pub use provider::TelemetryProvider;
pub use snapshot::{SessionData, SnapshotProvider, TelemetrySnapshot};
pub use types::{
    DriverEntry, DriverNumber, GapSample, PitEvent, PositionHolder, RaceResult, SafetyCarPeriod,
    SessionKey, Stint, TeamRadioRecording,
};
