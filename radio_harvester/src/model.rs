use accuracy_engine::{NotComputableReason, ScoreResult, ScoringError};
use serde::{Deserialize, Serialize};
use telemetry_feed::TeamRadioRecording;

/// Stage of the pipeline a recording failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Classification,
    Scoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Score(f64),
    NotComputable(NotComputableReason),
    Error {
        stage: Stage,
        message: String,
        retriable: bool,
    },
}

impl Outcome {
    pub fn failed(stage: Stage, err: &anyhow::Error) -> Self {
        Self::Error {
            stage,
            message: format!("{:#}", err),
            retriable: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<Result<ScoreResult, ScoringError>> for Outcome {
    fn from(result: Result<ScoreResult, ScoringError>) -> Self {
        match result {
            Ok(ScoreResult::Score(v)) => Self::Score(v),
            Ok(ScoreResult::NotComputable(reason)) => Self::NotComputable(reason),
            Err(e) => Self::Error {
                stage: Stage::Scoring,
                message: e.to_string(),
                retriable: e.is_retriable(),
            },
        }
    }
}

/// One JSON line of harvest output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarvestRecord {
    #[serde(flatten)]
    pub recording: TeamRadioRecording,
    pub transcript: Option<String>,
    pub classification: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}
