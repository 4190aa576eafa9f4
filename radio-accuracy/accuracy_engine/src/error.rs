use telemetry_feed::{DriverNumber, TelemetryError, TelemetryResult};
use thiserror::Error;

use crate::statement::StatementContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised classification label {label:?}")]
pub struct ClassificationParseError {
    pub label: String,
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    ClassificationParse(#[from] ClassificationParseError),

    #[error("missing {what} for {context}")]
    MissingTelemetry {
        what: &'static str,
        context: StatementContext,
    },

    #[error(
        "insufficient finishing history for driver {driver} ({samples} results, std dev {std_dev:.3}) for {context}"
    )]
    InsufficientHistory {
        driver: DriverNumber,
        samples: usize,
        std_dev: f64,
        context: StatementContext,
    },

    #[error("telemetry provider timed out on {endpoint} for {context}")]
    ProviderTimeout {
        endpoint: String,
        context: StatementContext,
    },

    #[error("telemetry provider unavailable on {endpoint} for {context}: {reason}")]
    ProviderUnavailable {
        endpoint: String,
        reason: String,
        context: StatementContext,
    },
}

impl ScoringError {
    /// Transport failures; the same statement may score on a later attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::ProviderUnavailable { .. }
        )
    }

    pub fn from_telemetry(err: TelemetryError, context: &StatementContext) -> Self {
        let context = context.clone();
        match err {
            TelemetryError::Timeout { endpoint } => Self::ProviderTimeout { endpoint, context },
            TelemetryError::Unavailable { endpoint, reason }
            | TelemetryError::Decode { endpoint, reason } => Self::ProviderUnavailable {
                endpoint,
                reason,
                context,
            },
        }
    }
}

/// Attach statement context to a provider result.
pub(crate) trait WithinStatement<T> {
    fn within(self, context: &StatementContext) -> Result<T, ScoringError>;
}

impl<T> WithinStatement<T> for TelemetryResult<T> {
    fn within(self, context: &StatementContext) -> Result<T, ScoringError> {
        self.map_err(|e| ScoringError::from_telemetry(e, context))
    }
}
