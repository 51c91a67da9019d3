//! Model invocation: a Gemini `generateContent` client and a bounded retry policy.
//!
//! Credentials and model identity are process-wide configuration
//! ([`ModelConfig`]), validated once at startup and passed explicitly into
//! [`GeminiClient::new`]. Request state is only the prompt.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::prompt::PromptDocument;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Unusable model configuration. Fatal at startup, never raised per request.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("model API key is missing or empty")]
    MissingApiKey,
    #[error("model id is empty")]
    MissingModel,
    #[error("invalid model base URL {0:?}: expected http:// or https://")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A failed call to the generative-text service.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("JSON parse error in service envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned empty output (finish reason: {})", .finish_reason.as_deref().unwrap_or("unknown"))]
    EmptyOutput { finish_reason: Option<String> },
    #[error("prompt was blocked by the model service: {reason}")]
    Blocked { reason: String },
}

impl ModelError {
    /// Transient failures worth another attempt: transport errors, request
    /// timeout, rate limiting, server errors, and empty output.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::EmptyOutput { .. } => true,
            Self::Service { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Json(_) | Self::Blocked { .. } => false,
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// The default is a single attempt: a model call is billable, so retries are
/// opt-in.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }

    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::none()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let secs = (self.initial_backoff.as_secs_f64() * factor)
            .min(self.max_backoff.as_secs_f64())
            .max(0.0);
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Process-wide model configuration.
#[derive(Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    /// Service root, e.g. `https://generativelanguage.googleapis.com` (no trailing slash needed).
    pub base_url: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            temperature: 0.2,
            max_output_tokens: 8192,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// Raw text returned by the model, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    pub text: String,
    pub model: String,
    /// Attempts used to obtain this output (1 without retries).
    pub attempts: u32,
}

/// A generative-text backend.
#[async_trait]
pub trait TextModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Send one prompt and return the model's text. One call, no retries.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Send a composed prompt to the model, retrying per `policy`.
///
/// Only errors for which [`ModelError::is_retryable`] holds are retried; the
/// last error is returned once attempts are exhausted.
pub async fn invoke<M: TextModel + ?Sized>(
    model: &M,
    prompt: &PromptDocument,
    policy: &RetryPolicy,
) -> Result<RawModelOutput, ModelError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let started = Instant::now();
        match model.generate(prompt.as_str()).await {
            Ok(text) => {
                info!(
                    model = model.model_id(),
                    attempt,
                    latency_ms = started.elapsed().as_millis() as u64,
                    output_chars = text.len(),
                    "model call complete"
                );
                return Ok(RawModelOutput {
                    text,
                    model: model.model_id().to_string(),
                    attempts: attempt,
                });
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let backoff = policy.backoff_for(attempt);
                warn!(
                    model = model.model_id(),
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "model call failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(model = model.model_id(), attempt, error = %e, "model call failed");
                return Err(e);
            }
        }
    }
}

// ── Gemini wire types ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ModelError> {
        let mut candidates = self.candidates.into_iter();
        let Some(first) = candidates.next() else {
            return Err(match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => ModelError::Blocked { reason },
                None => ModelError::EmptyOutput {
                    finish_reason: None,
                },
            });
        };

        let text: String = first
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyOutput {
                finish_reason: first.finish_reason,
            });
        }
        Ok(text)
    }
}

// ── Client ──

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl GeminiClient {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let config = ModelConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.config.model, prompt_chars = prompt.len(), "calling model");
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let raw = resp.text().await?;
        let envelope: GenerateResponse = serde_json::from_str(&raw)?;
        envelope.into_text()
    }
}
