use accuracy_engine::{
    AccuracyEngine, Calibration, RadioStatement, ReferenceSet, ScoreResult, ScoringError,
};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::{path::Path, sync::Arc};
use telemetry_feed::{DriverNumber, OpenF1Client, OpenF1Config, SessionKey};
use tracing_subscriber::EnvFilter;

// ---------- Request/Response types ----------

#[derive(Deserialize, Debug)]
struct ScoreRequest {
    session_key: u32,
    driver_number: u32,
    date: DateTime<Utc>,
    #[serde(default)]
    text: String,
    classification: String,
}

#[derive(serde::Serialize)]
struct Out {
    t: i64,
    session_key: u32,
    driver_number: u32,
    #[serde(flatten)]
    result: ScoreResult,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    engine: Arc<AccuracyEngine<OpenF1Client>>,
}

fn error_response(err: &ScoringError) -> ApiError {
    let status = match err {
        ScoringError::ClassificationParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScoringError::MissingTelemetry { .. } | ScoringError::InsufficientHistory { .. } => {
            StatusCode::NOT_FOUND
        }
        ScoringError::ProviderTimeout { .. } | ScoringError::ProviderUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "retriable": err.is_retriable() })),
    )
}

// ---------- Handlers ----------

async fn score(
    State(state): State<AppState>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<Out>, ApiError> {
    let statement = RadioStatement {
        session_key: SessionKey(payload.session_key),
        driver_number: DriverNumber(payload.driver_number),
        timestamp: payload.date,
        text: payload.text,
        classification: payload.classification,
    };

    let result = state.engine.score(&statement).await.map_err(|e| {
        tracing::warn!("scoring failed: {}", e);
        error_response(&e)
    })?;

    Ok(Json(Out {
        t: Utc::now().timestamp_millis(),
        session_key: payload.session_key,
        driver_number: payload.driver_number,
        result,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ---------- Startup ----------

fn parse_sessions(raw: &str) -> anyhow::Result<Vec<SessionKey>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map(SessionKey)
                .with_context(|| format!("invalid session key {:?} in REFERENCE_SESSIONS", s))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);

    let mut openf1 = OpenF1Config::default();
    if let Ok(base_url) = std::env::var("OPENF1_BASE_URL") {
        openf1.base_url = base_url;
    }
    let provider = Arc::new(OpenF1Client::new(openf1).context("failed to build OpenF1 client")?);

    let calibration = match std::env::var("CALIBRATION_PATH") {
        Ok(path) => Calibration::load(Path::new(&path))?,
        Err(_) => Calibration::default(),
    };
    tracing::info!("calibration: {:?}", calibration);

    let reference = match std::env::var("REFERENCE_SESSIONS") {
        Ok(raw) => ReferenceSet::new(parse_sessions(&raw)?),
        Err(_) => {
            let year: i32 = std::env::var("REFERENCE_YEAR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2023);
            ReferenceSet::for_season(provider.as_ref(), year)
                .await
                .with_context(|| format!("failed to load {} race sessions", year))?
        }
    };
    if reference.is_empty() {
        tracing::warn!("reference set is empty; post-race statements will not score");
    }

    let state = AppState {
        engine: Arc::new(AccuracyEngine::new(provider, calibration, reference)),
    };

    let app = axum::Router::new()
        .route("/score", post(score))
        .route("/health", get(health))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
