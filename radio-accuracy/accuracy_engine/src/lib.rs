//! Scores how accurate a driver's team-radio statement was, using timing
//! telemetry as ground truth.
//!
//! A statement is classified by sentiment and aspect, placed in or after the
//! driver's race, and scored either from the gap-to-leader trend that followed
//! it or from where the result sits in the driver's season distribution.

pub mod calibration;
pub mod classification;
pub mod context;
pub mod engine;
pub mod error;
pub mod in_race;
pub mod post_race;
pub mod statement;
pub mod stats;

pub use calibration::{Calibration, CalibrationError};
pub use classification::{Aspect, Classification, Polarity, Sentiment};
pub use context::RaceContext;
pub use engine::AccuracyEngine;
pub use error::{ClassificationParseError, ScoringError};
pub use post_race::ReferenceSet;
pub use statement::{NotComputableReason, RadioStatement, ScoreResult, StatementContext};
