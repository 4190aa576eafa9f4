use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverNumber(pub u32);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DriverNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tyre stint; lap numbers are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stint {
    pub driver_number: DriverNumber,
    pub stint_number: u32,
    pub lap_start: Option<u32>,
    /// `None` while the stint is still open or its end was never recorded.
    pub lap_end: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapSample {
    pub timestamp: DateTime<Utc>,
    pub gap_to_leader: f64, // seconds, negative if ahead
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitEvent {
    pub driver_number: DriverNumber,
    pub start: DateTime<Utc>,
    pub duration: f64, // seconds in pit lane
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyCarPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SafetyCarPeriod {
    /// Closed-interval overlap with `[from, to]`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start <= to && self.end >= from
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHolder {
    pub position: u32,
    pub driver_number: DriverNumber,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub session_key: SessionKey,
    pub driver_number: DriverNumber,
    pub finishing_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub driver_number: DriverNumber,
    pub last_name: String,
    pub name_acronym: Option<String>,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRadioRecording {
    pub session_key: SessionKey,
    pub driver_number: DriverNumber,
    pub date: DateTime<Utc>,
    pub recording_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 17, 13, min, 0).unwrap()
    }

    #[test]
    fn overlap_is_closed_on_both_ends() {
        let sc = SafetyCarPeriod { start: at(10), end: at(15) };
        assert!(sc.overlaps(at(5), at(10)));
        assert!(sc.overlaps(at(15), at(20)));
        assert!(sc.overlaps(at(11), at(12)));
        assert!(!sc.overlaps(at(0), at(9)));
        assert!(!sc.overlaps(at(16), at(21)));
    }

    #[test]
    fn keys_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&(SessionKey(9158), DriverNumber(1))).unwrap();
        assert_eq!(json, "[9158,1]");
    }
}
