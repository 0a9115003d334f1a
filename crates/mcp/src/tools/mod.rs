pub mod quotes;
pub mod transcribe;
pub mod weather;

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use toolwire_core::{ToolError, ToolRegistry};

use crate::config::{HttpConfig, ServerConfig};

/// Builds the frozen registry served by this binary, in listing order.
pub fn build_registry(config: &ServerConfig) -> anyhow::Result<ToolRegistry> {
    let http = HttpSource::new(&config.http)?;

    let registry = ToolRegistry::builder()
        .register(
            weather::definition(),
            weather::WeatherTool::new(http.clone(), &config.weather),
        )?
        .register(
            quotes::definition()?,
            quotes::QuoteTool::new(http, &config.quotes),
        )?
        .register(
            transcribe::definition(&config.transcribe),
            transcribe::TranscribeTool::new(&config.transcribe),
        )?
        .build();

    Ok(registry)
}

/// Shared HTTP client for upstream JSON APIs.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Sends `request` and decodes a 2xx JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ToolError> {
        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::upstream(format!("HTTP {}", status)));
        }

        response.json().await.map_err(|e| match e.is_timeout() {
            true => ToolError::Timeout(self.timeout),
            false => ToolError::upstream(format!("malformed response: {}", e)),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout(self.timeout)
        } else {
            ToolError::upstream(err.to_string())
        }
    }
}
