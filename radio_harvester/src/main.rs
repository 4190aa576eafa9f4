mod collaborators;
mod config;
mod harvest;
mod model;
mod progress;

use accuracy_engine::{AccuracyEngine, Calibration, ReferenceSet};
use anyhow::Context;
use std::{path::PathBuf, sync::Arc};
use telemetry_feed::{OpenF1Client, OpenF1Config, SessionKey};
use tracing_subscriber::EnvFilter;

use crate::collaborators::{OpenAiClassifier, OpenAiTranscriber};
use crate::config::HarvestConfig;
use crate::harvest::Harvester;
use crate::progress::LogReporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(resolve_config_path);
    let cfg = HarvestConfig::load(&cfg_path)?;
    tracing::info!("loaded harvest config from {}", cfg_path.display());

    let api_key = std::env::var(&cfg.api_key_env)
        .with_context(|| format!("{} not set", cfg.api_key_env))?;

    let provider = Arc::new(
        OpenF1Client::new(OpenF1Config {
            base_url: cfg.openf1_base_url.clone(),
            ..OpenF1Config::default()
        })
        .context("failed to build OpenF1 client")?,
    );

    let calibration = match &cfg.calibration_path {
        Some(path) => Calibration::load(path)?,
        None => Calibration::default(),
    };
    let reference = if cfg.reference_sessions.is_empty() {
        ReferenceSet::for_season(provider.as_ref(), cfg.reference_year)
            .await
            .with_context(|| format!("failed to load {} race sessions", cfg.reference_year))?
    } else {
        ReferenceSet::new(cfg.reference_sessions.iter().copied().map(SessionKey).collect())
    };

    let engine = Arc::new(AccuracyEngine::new(provider.clone(), calibration, reference));

    let http = reqwest::Client::new();
    let transcriber = OpenAiTranscriber::new(
        http.clone(),
        cfg.transcriber.endpoint.clone(),
        cfg.transcriber.model.clone(),
        api_key.clone(),
    );
    let classifier = OpenAiClassifier::new(
        http,
        cfg.classifier.endpoint.clone(),
        cfg.classifier.model.clone(),
        api_key,
    );

    let harvester = Harvester::new(
        provider,
        engine,
        transcriber,
        classifier,
        cfg.output_dir.clone(),
        cfg.workers,
    );
    let mut reporter = LogReporter::default();
    let summary = harvester.run(SessionKey(cfg.session_key), &mut reporter).await?;

    tracing::info!(
        "done: {} recordings, {} scored, {} not computable, {} failed -> {}",
        summary.recordings,
        summary.scored,
        summary.not_computable,
        summary.failed,
        cfg.output_dir.display()
    );
    Ok(())
}

fn resolve_config_path() -> PathBuf {
    // Prefer the working directory, then a config/ folder, then next to the binary.
    let candidates = [
        PathBuf::from("harvest.json"),
        PathBuf::from("config/harvest.json"),
        {
            let mut p = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
            p.pop(); // exe dir
            p.push("harvest.json");
            p
        },
    ];

    for c in candidates {
        if c.exists() {
            return c;
        }
    }

    // Fallback to default relative path; load() will error
    PathBuf::from("harvest.json")
}
