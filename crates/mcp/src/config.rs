use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

use toolwire_core::DEFAULT_PIPELINE_DEPTH;

use crate::tools::transcribe::MODELS;

/// Server configuration. Every field has a default, so a missing file or a
/// partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server_name: String,
    pub pipeline_depth: usize,
    pub http: HttpConfig,
    pub weather: WeatherConfig,
    pub quotes: QuoteConfig,
    pub transcribe: TranscribeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Program to run, e.g. `whisper-transcribe` or `python3`.
    pub command: String,
    /// Arguments placed before the input path, e.g. a script path.
    pub args: Vec<String>,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "toolwire-mcp".to_string(),
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            http: HttpConfig::default(),
            weather: WeatherConfig::default(),
            quotes: QuoteConfig::default(),
            transcribe: TranscribeConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("toolwire-mcp/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            command: "whisper-transcribe".to_string(),
            args: Vec::new(),
            default_model: "small".to_string(),
            timeout_secs: 900,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_name.trim().is_empty() {
            bail!("server_name must not be empty");
        }
        if self.pipeline_depth == 0 {
            bail!("pipeline_depth must be at least 1");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be at least 1");
        }
        if !MODELS.contains(&self.transcribe.default_model.as_str()) {
            bail!(
                "transcribe.default_model must be one of: {}",
                MODELS.join(", ")
            );
        }
        Ok(())
    }
}
