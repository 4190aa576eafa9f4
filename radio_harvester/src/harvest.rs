//! Drives transcription, classification and scoring over every team-radio
//! recording of a session, appending one JSON line per recording.

use accuracy_engine::{AccuracyEngine, RadioStatement};
use anyhow::{Context, Result};
use futures_util::{stream, StreamExt};
use std::{path::PathBuf, sync::Arc, time::Instant};
use telemetry_feed::{DriverEntry, SessionKey, TeamRadioRecording, TelemetryProvider};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

use crate::collaborators::{Classifier, Transcriber};
use crate::model::{HarvestRecord, Outcome, Stage};
use crate::progress::{ProgressReporter, ProgressTracker};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestSummary {
    pub recordings: usize,
    pub scored: usize,
    pub not_computable: usize,
    pub failed: usize,
}

pub struct Harvester<P: ?Sized, T, C> {
    provider: Arc<P>,
    engine: Arc<AccuracyEngine<P>>,
    transcriber: T,
    classifier: C,
    output_dir: PathBuf,
    workers: usize,
}

impl<P, T, C> Harvester<P, T, C>
where
    P: TelemetryProvider + ?Sized,
    T: Transcriber,
    C: Classifier,
{
    pub fn new(
        provider: Arc<P>,
        engine: Arc<AccuracyEngine<P>>,
        transcriber: T,
        classifier: C,
        output_dir: PathBuf,
        workers: usize,
    ) -> Self {
        Self {
            provider,
            engine,
            transcriber,
            classifier,
            output_dir,
            workers: workers.max(1),
        }
    }

    pub async fn run<R: ProgressReporter>(
        &self,
        session: SessionKey,
        reporter: &mut R,
    ) -> Result<HarvestSummary> {
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let drivers = self
            .provider
            .drivers(session)
            .await
            .with_context(|| format!("failed to list drivers of session {}", session))?;

        let mut queue: Vec<(DriverEntry, Vec<TeamRadioRecording>)> = Vec::with_capacity(drivers.len());
        for driver in drivers {
            let radio = self
                .provider
                .team_radio(session, driver.driver_number)
                .await
                .with_context(|| format!("failed to list team radio for {}", driver.last_name))?;
            queue.push((driver, radio));
        }

        let total = queue.iter().map(|(_, r)| r.len()).sum();
        tracing::info!("session {}: {} recordings to harvest", session, total);

        let started = Instant::now();
        let mut progress = ProgressTracker::new(total);
        let mut summary = HarvestSummary::default();

        for (driver, radio) in queue {
            let path = self.output_dir.join(format!("{}TeamRadio.jsonl", driver.last_name));
            let mut out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;

            let mut records = stream::iter(radio)
                .map(|recording| self.process(recording))
                .buffered(self.workers);

            while let Some(record) = records.next().await {
                let mut line = serde_json::to_vec(&record)?;
                line.push(b'\n');
                out.write_all(&line)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;

                summary.recordings += 1;
                match &record.outcome {
                    Outcome::Score(_) => summary.scored += 1,
                    Outcome::NotComputable(_) => summary.not_computable += 1,
                    Outcome::Error { .. } => summary.failed += 1,
                }
                progress.advance(!record.outcome.is_error(), started.elapsed());
                reporter.report(&progress);
            }
            out.flush().await?;
        }
        Ok(summary)
    }

    async fn process(&self, recording: TeamRadioRecording) -> HarvestRecord {
        let mut record = HarvestRecord {
            recording,
            transcript: None,
            classification: None,
            outcome: Outcome::Score(0.0),
        };

        let transcript = match self.transcriber.transcribe(&record.recording.recording_url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("transcription failed for {}: {:#}", record.recording.recording_url, e);
                record.outcome = Outcome::failed(Stage::Transcription, &e);
                return record;
            }
        };
        record.transcript = Some(transcript.clone());

        let label = match self.classifier.classify(&transcript).await {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!("classification failed for {}: {:#}", record.recording.recording_url, e);
                record.outcome = Outcome::failed(Stage::Classification, &e);
                return record;
            }
        };
        record.classification = Some(label.clone());

        let statement = RadioStatement {
            session_key: record.recording.session_key,
            driver_number: record.recording.driver_number,
            timestamp: record.recording.date,
            text: transcript,
            classification: label,
        };
        record.outcome = self.engine.score(&statement).await.into();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accuracy_engine::{Calibration, ReferenceSet};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use telemetry_feed::{DriverNumber, SessionData, SnapshotProvider, TelemetrySnapshot};

    const SESSION: SessionKey = SessionKey(9158);
    const SAINZ: DriverNumber = DriverNumber(55);
    const LECLERC: DriverNumber = DriverNumber(16);

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 17, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    /// Transcript is the file name; "broken" fails.
    struct UrlTranscriber;

    #[async_trait]
    impl Transcriber for UrlTranscriber {
        async fn transcribe(&self, url: &str) -> Result<String> {
            let name = url.rsplit('/').next().unwrap_or_default();
            if name == "broken.mp3" {
                anyhow::bail!("decoder error");
            }
            Ok(name.trim_end_matches(".mp3").replace('_', " "))
        }
    }

    /// Labels everything about tyres by the first word of the transcript.
    struct KeywordClassifier;

    #[async_trait]
    impl Classifier for KeywordClassifier {
        async fn classify(&self, transcript: &str) -> Result<String> {
            Ok(match transcript.split(' ').next() {
                Some("good") => "Positive about tyres".to_string(),
                Some("bad") => "Negative about tyres".to_string(),
                _ => "Neutral".to_string(),
            })
        }
    }

    fn session() -> SessionData {
        let mut s = SessionData::race(SESSION, 2023)
            .driver(SAINZ, "Sainz")
            .driver(LECLERC, "Leclerc")
            .stint(SAINZ, 1, 1, 62)
            .lap(SAINZ, 62, t(118))
            .position(LECLERC, 1, t(0))
            .position(SAINZ, 2, t(0))
            .radio(SAINZ, t(30), "https://radio.test/bad_tyres.mp3")
            .radio(SAINZ, t(40), "https://radio.test/copy_that.mp3")
            .radio(SAINZ, t(50), "https://radio.test/broken.mp3");
        for i in 0..30 {
            s = s.gap(SAINZ, t(30 + i), 2.0 + i as f64);
        }
        s
    }

    #[derive(Default)]
    struct Collecting(Vec<ProgressTracker>);

    impl ProgressReporter for Collecting {
        fn report(&mut self, p: &ProgressTracker) {
            self.0.push(p.clone());
        }
    }

    #[tokio::test]
    async fn test_harvest_writes_one_line_per_recording() {
        let provider = Arc::new(SnapshotProvider::new(TelemetrySnapshot::new(vec![session()])));
        let engine = Arc::new(AccuracyEngine::new(
            provider.clone(),
            Calibration::default(),
            ReferenceSet::default(),
        ));
        let out_dir = std::env::temp_dir().join(format!("radio_harvest_{}", std::process::id()));
        let harvester = Harvester::new(
            provider,
            engine,
            UrlTranscriber,
            KeywordClassifier,
            out_dir.clone(),
            2,
        );

        let mut reporter = Collecting::default();
        let summary = harvester.run(SESSION, &mut reporter).await.unwrap();
        assert_eq!(
            summary,
            HarvestSummary {
                recordings: 3,
                scored: 1,
                not_computable: 1,
                failed: 1,
            }
        );

        let text = std::fs::read_to_string(out_dir.join("SainzTeamRadio.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["transcript"], "bad tyres");
        assert_eq!(lines[0]["score"], 1.0);
        assert_eq!(lines[1]["not_computable"], "neutral_sentiment");
        assert_eq!(lines[2]["error"]["stage"], "transcription");
        assert_eq!(lines[2]["error"]["message"], "decoder error");

        // no radio for Leclerc: file exists but is empty
        assert_eq!(
            std::fs::read_to_string(out_dir.join("LeclercTeamRadio.jsonl")).unwrap(),
            ""
        );

        let last = reporter.0.last().unwrap();
        assert_eq!((last.completed, last.failed, last.remaining()), (3, 1, 0));
        std::fs::remove_dir_all(&out_dir).ok();
    }
}
