use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub endpoint: String,
    pub model: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HarvestConfig {
    pub session_key: u32,
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,
    /// Explicit reference sessions; when empty, every race of `reference_year`.
    #[serde(default)]
    pub reference_sessions: Vec<u32>,
    #[serde(default = "default_openf1_base_url")]
    pub openf1_base_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub calibration_path: Option<PathBuf>,
    #[serde(default = "default_transcriber")]
    pub transcriber: EndpointConfig,
    #[serde(default = "default_classifier")]
    pub classifier: EndpointConfig,
    /// Environment variable holding the API key for both collaborators.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_reference_year() -> i32 {
    2023
}

fn default_openf1_base_url() -> String {
    telemetry_feed::openf1::DEFAULT_BASE_URL.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("radio_out")
}

fn default_workers() -> usize {
    4
}

fn default_transcriber() -> EndpointConfig {
    EndpointConfig {
        endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
        model: "whisper-1".to_string(),
    }
}

fn default_classifier() -> EndpointConfig {
    EndpointConfig {
        endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        model: "gpt-3.5-turbo".to_string(),
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read harvest config at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid harvest config JSON at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg: HarvestConfig = serde_json::from_str(r#"{"session_key": 9158}"#).unwrap();
        assert_eq!(cfg.session_key, 9158);
        assert_eq!(cfg.reference_year, 2023);
        assert!(cfg.reference_sessions.is_empty());
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.transcriber.model, "whisper-1");
        assert_eq!(cfg.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_missing_session_key_is_rejected() {
        assert!(serde_json::from_str::<HarvestConfig>(r#"{"workers": 2}"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let err = HarvestConfig::load(Path::new("/nonexistent/harvest.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/harvest.json"));
    }
}
