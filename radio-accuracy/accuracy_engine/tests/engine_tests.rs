/// End-to-end scoring against replayed telemetry
///
/// Run with: cargo test -p accuracy_engine --test engine_tests -- --nocapture
use accuracy_engine::{
    AccuracyEngine, Calibration, NotComputableReason, RadioStatement, ReferenceSet, ScoreResult,
    ScoringError,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use telemetry_feed::{
    DriverEntry, DriverNumber, GapSample, PitEvent, PositionHolder, RaceResult, SafetyCarPeriod,
    SessionData, SessionKey, SnapshotProvider, Stint, TeamRadioRecording, TelemetryError,
    TelemetryProvider, TelemetryResult, TelemetrySnapshot,
};

const RACE: SessionKey = SessionKey(9158);
const SUBJECT: DriverNumber = DriverNumber(44);
const LEADER: DriverNumber = DriverNumber(1);

fn t(min: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 9, 17, 12, 0, 0).unwrap() + Duration::minutes(min)
}

/// Race where SUBJECT finishes on lap 50, starting that lap at t(90).
fn race(key: SessionKey) -> SessionData {
    SessionData::race(key, 2023)
        .stint(SUBJECT, 1, 1, 25)
        .stint(SUBJECT, 2, 26, 50)
        .lap(SUBJECT, 50, t(90))
}

/// Gap samples once a minute from `start`.
fn with_gaps(mut session: SessionData, driver: DriverNumber, start: i64, gaps: &[f64]) -> SessionData {
    for (i, g) in gaps.iter().enumerate() {
        session = session.gap(driver, t(start + i as i64), *g);
    }
    session
}

fn statement(at: DateTime<Utc>, label: &str) -> RadioStatement {
    RadioStatement {
        session_key: RACE,
        driver_number: SUBJECT,
        timestamp: at,
        text: "box box".to_string(),
        classification: label.to_string(),
    }
}

fn engine(sessions: Vec<SessionData>, reference: Vec<SessionKey>) -> AccuracyEngine<SnapshotProvider> {
    let provider = SnapshotProvider::new(TelemetrySnapshot::new(sessions));
    AccuracyEngine::new(Arc::new(provider), Calibration::default(), ReferenceSet::new(reference))
}

fn trailing_race(gaps: &[f64]) -> SessionData {
    let session = race(RACE)
        .position(LEADER, 1, t(0))
        .position(SUBJECT, 2, t(0));
    with_gaps(session, SUBJECT, 30, gaps)
}

fn score_value(result: Result<ScoreResult, ScoringError>) -> f64 {
    result.unwrap().value().expect("expected a score")
}

#[tokio::test]
async fn test_neutral_and_encoded_are_not_computable() {
    // no telemetry at all: interpretation must short-circuit before any lookup
    let e = engine(vec![], vec![]);
    assert_eq!(
        e.score(&statement(t(30), "Neutral")).await.unwrap(),
        ScoreResult::NotComputable(NotComputableReason::NeutralSentiment)
    );
    assert_eq!(
        e.score(&statement(t(30), "Encoded strategy")).await.unwrap(),
        ScoreResult::NotComputable(NotComputableReason::EncodedStrategy)
    );
}

#[tokio::test]
async fn test_unknown_label_is_a_parse_error() {
    let e = engine(vec![], vec![]);
    let err = e.score(&statement(t(30), "Angry about engine")).await.unwrap_err();
    assert!(matches!(err, ScoringError::ClassificationParse(_)));
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn test_growing_gap_confirms_negative_statement() {
    println!("\n=== Test: In-Race Negative ===");
    let e = engine(vec![trailing_race(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0])], vec![]);

    let negative = score_value(e.score(&statement(t(30), "Negative about tyres")).await);
    let positive = score_value(e.score(&statement(t(30), "Positive about tyres")).await);
    assert_eq!(negative, 1.0);
    assert_eq!(positive, 0.0);
    println!("✓ negative={} positive={}", negative, positive);
}

#[tokio::test]
async fn test_shrinking_gap_confirms_positive_statement() {
    let e = engine(vec![trailing_race(&[10.0, 8.5, 7.0, 5.5, 4.0, 2.5])], vec![]);
    assert_eq!(score_value(e.score(&statement(t(30), "Positive about car")).await), 1.0);
}

#[tokio::test]
async fn test_safety_car_forces_accurate() {
    println!("\n=== Test: Safety Car Override ===");
    // no gap samples at all, which would otherwise be not computable
    let session = race(RACE)
        .position(LEADER, 1, t(0))
        .position(SUBJECT, 2, t(0))
        .safety_car(t(34), t(40));
    let e = engine(vec![session], vec![]);

    for label in ["Positive about car", "Negative about strategy"] {
        assert_eq!(
            e.score(&statement(t(30), label)).await.unwrap(),
            ScoreResult::Score(1.0),
            "label {}",
            label
        );
    }
    println!("✓ Safety car overlap scores 1 for either sentiment");
}

#[tokio::test]
async fn test_safety_car_outside_window_is_ignored() {
    let session = trailing_race(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0]).safety_car(t(36), t(40));
    let e = engine(vec![session], vec![]);
    assert_eq!(score_value(e.score(&statement(t(30), "Positive about car")).await), 0.0);
}

#[tokio::test]
async fn test_leadership_inversion_mirrors_trailing_case() {
    println!("\n=== Test: Leadership Inversion ===");
    let raw = [1.0, 1.5, 2.5, 2.8, 4.0, 6.0];
    let mirrored: Vec<f64> = raw.iter().rev().copied().collect();
    let chaser = DriverNumber(16);

    let trailing = engine(vec![trailing_race(&raw)], vec![]);

    let leading_session = race(RACE)
        .position(SUBJECT, 1, t(0))
        .position(chaser, 2, t(0));
    let leading = engine(vec![with_gaps(leading_session, chaser, 30, &mirrored)], vec![]);

    for label in ["Positive about car", "Negative about car"] {
        let a = score_value(trailing.score(&statement(t(30), label)).await);
        let b = score_value(leading.score(&statement(t(30), label)).await);
        assert!((a - b).abs() < 1e-12, "{}: trailing {} vs leading {}", label, a, b);
        println!("✓ {}: {:.4}", label, a);
    }
}

#[tokio::test]
async fn test_leader_extending_lead_is_positive() {
    let chaser = DriverNumber(16);
    let session = race(RACE)
        .position(SUBJECT, 1, t(0))
        .position(chaser, 2, t(0));
    let session = with_gaps(session, chaser, 30, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let e = engine(vec![session], vec![]);
    assert_eq!(score_value(e.score(&statement(t(30), "Positive about tyres")).await), 1.0);
}

#[tokio::test]
async fn test_pit_correction_is_window_wide() {
    let gaps = [5.0, 4.0, 6.5, 6.0, 8.0, 7.5];
    let plain = engine(vec![trailing_race(&gaps)], vec![]);
    let pitted = engine(
        vec![trailing_race(&gaps)
            .pit(SUBJECT, t(32), 22.0)
            .pit(LEADER, t(33), 21.5)],
        vec![],
    );
    let a = score_value(plain.score(&statement(t(30), "Negative about car")).await);
    let b = score_value(pitted.score(&statement(t(30), "Negative about car")).await);
    assert!((a - b).abs() < 1e-12, "uniform offset must not change the trend");
}

#[tokio::test]
async fn test_single_sample_is_not_computable() {
    // one sample, landing between t4 and t5
    let session = race(RACE)
        .position(LEADER, 1, t(0))
        .position(SUBJECT, 2, t(0))
        .gap(SUBJECT, t(34) + Duration::seconds(30), 3.0);
    let e = engine(vec![session], vec![]);
    assert_eq!(
        e.score(&statement(t(30), "Negative about car")).await.unwrap(),
        ScoreResult::NotComputable(NotComputableReason::InsufficientSamples { valid: 1 })
    );
}

#[tokio::test]
async fn test_missing_leader_is_an_error() {
    let e = engine(vec![with_gaps(race(RACE), SUBJECT, 30, &[1.0; 6])], vec![]);
    let err = e.score(&statement(t(30), "Negative about car")).await.unwrap_err();
    assert!(matches!(err, ScoringError::MissingTelemetry { .. }));
    assert!(err.to_string().contains("driver #44"), "context missing: {}", err);
}

#[tokio::test]
async fn test_missing_stints_is_an_error() {
    let e = engine(vec![SessionData::race(RACE, 2023)], vec![]);
    let err = e.score(&statement(t(30), "Negative about car")).await.unwrap_err();
    assert!(matches!(err, ScoringError::MissingTelemetry { what: "tyre stints", .. }));
}

fn season(positions: &[u32]) -> (Vec<SessionData>, Vec<SessionKey>) {
    let sessions: Vec<SessionData> = positions
        .iter()
        .enumerate()
        .map(|(i, &p)| SessionData::race(SessionKey(9000 + i as u32), 2023).position(SUBJECT, p, t(100)))
        .collect();
    let keys = sessions.iter().map(|s| s.session_key).collect();
    (sessions, keys)
}

#[tokio::test]
async fn test_post_race_dominant_result() {
    println!("\n=== Test: Post-Race Distribution ===");
    let (mut sessions, keys) = season(&[4, 5, 6, 5, 4, 6, 5, 5, 4, 6]);
    sessions.push(race(RACE).position(SUBJECT, 1, t(92)));
    let e = engine(sessions, keys);

    // finish is t(91); t(95) is after it
    let score = score_value(e.score(&statement(t(95), "Positive about strategy")).await);
    assert!((score - 0.25).abs() < 1e-9, "score {}", score);
    println!("✓ P1 against a P4-P6 history scores {}", score);
}

#[tokio::test]
async fn test_post_race_flat_history_is_insufficient() {
    let (mut sessions, keys) = season(&[3, 3, 3, 3, 3]);
    sessions.push(race(RACE).position(SUBJECT, 1, t(92)));
    let e = engine(sessions, keys);

    let err = e.score(&statement(t(95), "Negative about car")).await.unwrap_err();
    match err {
        ScoringError::InsufficientHistory { samples, std_dev, .. } => {
            assert_eq!(samples, 5);
            assert_eq!(std_dev, 0.0);
        }
        other => panic!("expected insufficient history, got {:?}", other),
    }
}

#[tokio::test]
async fn test_post_race_without_finishing_position() {
    let (mut sessions, keys) = season(&[3, 7]);
    sessions.push(race(RACE));
    let e = engine(sessions, keys);
    let err = e.score(&statement(t(95), "Negative about car")).await.unwrap_err();
    assert!(matches!(err, ScoringError::MissingTelemetry { what: "finishing position", .. }));
}

#[tokio::test]
async fn test_score_many_keeps_input_order() {
    let e = engine(vec![trailing_race(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0])], vec![]);
    let statements = vec![
        statement(t(30), "Negative about car"),
        statement(t(30), "Neutral"),
        statement(t(30), "Positive about car"),
        statement(t(30), "nonsense"),
    ];
    let results = e.score_many(&statements, 2).await;
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap(), &ScoreResult::Score(1.0));
    assert!(matches!(results[1], Ok(ScoreResult::NotComputable(_))));
    assert_eq!(results[2].as_ref().unwrap(), &ScoreResult::Score(0.0));
    assert!(results[3].is_err());
}

/// Delegates to a snapshot but times out on gap lookups.
struct TimingOutProvider(SnapshotProvider);

#[async_trait]
impl TelemetryProvider for TimingOutProvider {
    async fn stints(&self, s: SessionKey, d: DriverNumber) -> TelemetryResult<Vec<Stint>> {
        self.0.stints(s, d).await
    }
    async fn lap_start(&self, s: SessionKey, d: DriverNumber, lap: u32) -> TelemetryResult<Option<DateTime<Utc>>> {
        self.0.lap_start(s, d, lap).await
    }
    async fn gap_to_leader_at(&self, _: SessionKey, _: DriverNumber, _: DateTime<Utc>) -> TelemetryResult<Option<GapSample>> {
        Err(TelemetryError::Timeout {
            endpoint: "intervals".to_string(),
        })
    }
    async fn pit_events(&self, s: SessionKey, d: DriverNumber, from: DateTime<Utc>, to: DateTime<Utc>) -> TelemetryResult<Vec<PitEvent>> {
        self.0.pit_events(s, d, from, to).await
    }
    async fn position_holder_at(&self, s: SessionKey, p: u32, at: DateTime<Utc>) -> TelemetryResult<Option<PositionHolder>> {
        self.0.position_holder_at(s, p, at).await
    }
    async fn safety_car_periods(&self, s: SessionKey, from: DateTime<Utc>, to: DateTime<Utc>) -> TelemetryResult<Vec<SafetyCarPeriod>> {
        self.0.safety_car_periods(s, from, to).await
    }
    async fn finishing_position(&self, s: SessionKey, d: DriverNumber) -> TelemetryResult<Option<RaceResult>> {
        self.0.finishing_position(s, d).await
    }
    async fn race_sessions(&self, year: i32) -> TelemetryResult<Vec<SessionKey>> {
        self.0.race_sessions(year).await
    }
    async fn drivers(&self, s: SessionKey) -> TelemetryResult<Vec<DriverEntry>> {
        self.0.drivers(s).await
    }
    async fn team_radio(&self, s: SessionKey, d: DriverNumber) -> TelemetryResult<Vec<TeamRadioRecording>> {
        self.0.team_radio(s, d).await
    }
}

#[tokio::test]
async fn test_provider_timeout_fails_whole_attempt() {
    let snapshot = TelemetrySnapshot::new(vec![trailing_race(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0])]);
    let provider: Arc<dyn TelemetryProvider> =
        Arc::new(TimingOutProvider(SnapshotProvider::new(snapshot)));
    let e = AccuracyEngine::new(provider, Calibration::default(), ReferenceSet::default());

    let err = e.score(&statement(t(30), "Negative about car")).await.unwrap_err();
    assert!(matches!(err, ScoringError::ProviderTimeout { ref endpoint, .. } if endpoint == "intervals"));
    assert!(err.is_retriable());
}
