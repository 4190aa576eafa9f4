use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use telemetry_feed::{DriverNumber, SessionKey};

/// A transcribed radio message together with its classifier label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioStatement {
    pub session_key: SessionKey,
    pub driver_number: DriverNumber,
    #[serde(alias = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    /// Raw label, e.g. "Negative about tyres".
    pub classification: String,
}

impl RadioStatement {
    pub fn context(&self) -> StatementContext {
        StatementContext {
            session_key: self.session_key,
            driver_number: self.driver_number,
            timestamp: self.timestamp,
        }
    }
}

/// Identifies the statement an error or log line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementContext {
    pub session_key: SessionKey,
    pub driver_number: DriverNumber,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StatementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session {} driver {} at {}",
            self.session_key,
            self.driver_number,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Why a statement yields no score. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotComputableReason {
    NeutralSentiment,
    EncodedStrategy,
    InsufficientSamples { valid: usize },
}

impl fmt::Display for NotComputableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeutralSentiment => write!(f, "neutral sentiment has no direction"),
            Self::EncodedStrategy => write!(f, "encoded strategy has no direction"),
            Self::InsufficientSamples { valid } => {
                write!(f, "only {} valid gap samples", valid)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreResult {
    Score(f64),
    NotComputable(NotComputableReason),
}

impl ScoreResult {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Score(v) => Some(*v),
            Self::NotComputable(_) => None,
        }
    }
}
