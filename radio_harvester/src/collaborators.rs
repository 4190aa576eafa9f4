//! Speech-to-text and label classification, both delegated to OpenAI-compatible
//! HTTP endpoints. Errors are passed through as-is; the harvest loop records
//! them against the recording and moves on.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording_url: &str) -> Result<String>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns the raw label; the scoring engine decides whether it is valid.
    async fn classify(&self, transcript: &str) -> Result<String>;
}

pub const CATEGORY_PROMPT: &str = "The following is a transcript of a Formula 1 driver's team radio. \
Reply with exactly one of these categories and nothing else: \
Positive about car, Positive about strategy, Positive about tyres, \
Negative about car, Negative about strategy, Negative about tyres, \
Encoded strategy, Neutral. \
Use Encoded strategy when the driver refers to coded plans such as Plan A or Plan B. \
Transcript: ";

#[derive(Deserialize, Debug)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Debug)]
struct ChatMessage {
    content: String,
}

pub struct OpenAiTranscriber {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiTranscriber {
    pub fn new(http: reqwest::Client, endpoint: String, model: String, api_key: String) -> Self {
        Self {
            http,
            endpoint,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String> {
        let audio = self
            .http
            .get(recording_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("failed to download {}", recording_url))?
            .bytes()
            .await?;

        let file_name = recording_url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("radio.mp3")
            .to_string();
        let part = Part::bytes(audio.to_vec())
            .file_name(file_name)
            .mime_str("audio/mpeg")?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let resp: TranscriptionResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.text.trim().to_string())
    }
}

pub struct OpenAiClassifier {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClassifier {
    pub fn new(http: reqwest::Client, endpoint: String, model: String, api_key: String) -> Self {
        Self {
            http,
            endpoint,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, transcript: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": format!("{}{}", CATEGORY_PROMPT, transcript) }],
        });
        let resp: ChatResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        match resp.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content.trim().to_string()),
            None => bail!("classifier returned no choices"),
        }
    }
}
