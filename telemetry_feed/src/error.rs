use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("telemetry provider unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    #[error("failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl TelemetryError {
    /// Transport-level failures the caller may retry later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Timeout { endpoint }
            | Self::Unavailable { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
