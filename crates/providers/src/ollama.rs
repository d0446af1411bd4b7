//! Ollama transport for the policy oracle.
//!
//! Speaks the native Ollama API rather than the OpenAI-compatible one:
//! - `POST /api/generate` with `stream: false` for completions
//! - `GET /api/tags` for the connectivity probe and model listing
//!
//! Every request carries an explicit timeout so a hung model server can never
//! stall a decision cycle indefinitely.

use async_trait::async_trait;
use blockmind_config::OracleConfig;
use blockmind_core::error::OracleError;
use blockmind_core::{OracleRequest, PolicyOracle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::prompt;

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A policy oracle backed by a local Ollama server.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    sampling: SamplingOptions,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaOracle {
    /// Create an oracle for `model` served at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            sampling: SamplingOptions::default(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Build from the `[oracle]` config section.
    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(&config.base_url, &config.model)
            .with_sampling(SamplingOptions {
                temperature: config.temperature,
                top_p: config.top_p,
            })
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_body(&self, request: &OracleRequest) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: prompt::render(request),
            stream: false,
            options: GenerateOptions {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                num_predict: request.max_response_tokens(),
            },
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            OracleError::Unreachable(e.to_string())
        }
    }

    /// Names of the models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, OracleError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status_code: status,
                message,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("Failed to parse tags: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl PolicyOracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.generate_body(&request);

        debug!(
            model = %self.model,
            max_tokens = request.max_response_tokens(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Oracle returned error");
            return Err(OracleError::Api {
                status_code: status,
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("Failed to parse response: {e}")))?;

        Ok(parsed.response.trim().to_string())
    }

    async fn check_available(&self) -> Result<bool, OracleError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types ---

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
