//! Token compression adapter.
//!
//! Compression is a best-effort size reduction: every failure is folded into
//! an unsuccessful [`CompressionOutcome`] that carries the original text, so
//! callers can fall back without handling errors.

use crate::config::env_var;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const TOKEN_COMPANY_API_KEY_ENV: &str = "TOKEN_COMPANY_API_KEY";
pub const TOKEN_COMPANY_BASE_URL_ENV: &str = "TOKEN_COMPANY_BASE_URL";

const DEFAULT_TOKEN_COMPANY_BASE_URL: &str = "https://api.thetokencompany.com";
const DEFAULT_COMPRESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Texts with fewer meaningful characters than this are passed through untouched.
const MIN_COMPRESSIBLE_CHARS: usize = 50;

/// Named aggressiveness presets.
pub mod presets {
    pub const CONSERVATIVE: f64 = 0.35;
    pub const BALANCED: f64 = 0.55;
    pub const AGGRESSIVE: f64 = 0.75;
    pub const ACADEMIC: f64 = 0.5;
    pub const NOTES: f64 = 0.65;
}

/// Look up a preset by name; unknown names get `balanced`.
pub fn preset(name: &str) -> f64 {
    match name {
        "conservative" => presets::CONSERVATIVE,
        "aggressive" => presets::AGGRESSIVE,
        "academic" => presets::ACADEMIC,
        "notes" => presets::NOTES,
        _ => presets::BALANCED,
    }
}

/// Rough token estimate: words × 1.3.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * 1.3) as usize
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub success: bool,
    /// Compressed text on success, the original text otherwise.
    pub compressed_text: String,
    /// Compressed size over original size, in tokens. 1.0 when nothing changed.
    pub ratio: f64,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompressionOutcome {
    pub fn unchanged(text: &str) -> Self {
        let tokens = estimate_tokens(text);
        Self {
            success: true,
            compressed_text: text.to_string(),
            ratio: 1.0,
            original_tokens: tokens,
            compressed_tokens: tokens,
            error: None,
        }
    }

    pub fn failed(text: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::unchanged(text)
        }
    }
}

/// Compresses text given an aggressiveness in `[0, 1]`.
#[async_trait]
pub trait CompressionAdapter: Send + Sync {
    async fn compress(&self, text: &str, aggressiveness: f64) -> CompressionOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("compression not configured: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CompressionError {
    /// Human-readable message with the failure category up front.
    fn categorized(&self) -> String {
        match self {
            CompressionError::Status { status: 401 | 403, .. } => {
                format!("Authentication failed: {self}")
            }
            CompressionError::Status { status: 429, .. } => format!("Rate limit exceeded: {self}"),
            CompressionError::Timeout(_) => format!("Request timed out: {self}"),
            _ => self.to_string(),
        }
    }
}

// ============================================================================
// The Token Company client
// ============================================================================

#[derive(Clone)]
pub struct CompressionConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl fmt::Debug for CompressionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompressionConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: Url::parse(DEFAULT_TOKEN_COMPANY_BASE_URL).expect("default base URL is valid"),
            timeout: DEFAULT_COMPRESSION_TIMEOUT,
        }
    }

    /// `TOKEN_COMPANY_API_KEY` (+ optional `TOKEN_COMPANY_BASE_URL`).
    pub fn from_env() -> Result<Self, CompressionError> {
        let key = env_var(TOKEN_COMPANY_API_KEY_ENV).ok_or_else(|| {
            CompressionError::Config(format!("{TOKEN_COMPANY_API_KEY_ENV} is not set"))
        })?;
        let mut config = Self::new(&key);
        if let Some(url) = env_var(TOKEN_COMPANY_BASE_URL_ENV) {
            config.base_url = Url::parse(&url).map_err(|e| {
                CompressionError::Config(format!("invalid {TOKEN_COMPANY_BASE_URL_ENV}: {e}"))
            })?;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct CompressRequest<'a> {
    input: &'a str,
    compression_settings: CompressSettings,
}

#[derive(Serialize)]
struct CompressSettings {
    aggressiveness: f64,
}

#[derive(Deserialize)]
struct CompressResponse {
    output: String,
    #[serde(default)]
    original_input_tokens: Option<usize>,
    #[serde(default)]
    output_tokens: Option<usize>,
}

/// HTTP client for The Token Company compression API.
pub struct TokenCompanyClient {
    client: Client,
    config: CompressionConfig,
}

impl TokenCompanyClient {
    pub fn new(config: CompressionConfig) -> Result<Self, CompressionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompressionError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn request(&self, text: &str, aggressiveness: f64) -> Result<CompressionOutcome, CompressionError> {
        let url = format!("{}/v1/compress", self.config.base_url.as_str().trim_end_matches('/'));
        let body = CompressRequest {
            input: text,
            compression_settings: CompressSettings {
                aggressiveness: aggressiveness.clamp(0.0, 1.0),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompressionError::Timeout(e.to_string())
                } else {
                    CompressionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompressionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompressResponse = response
            .json()
            .await
            .map_err(|e| CompressionError::InvalidResponse(e.to_string()))?;

        let original_tokens = parsed
            .original_input_tokens
            .unwrap_or_else(|| estimate_tokens(text));
        let compressed_tokens = parsed
            .output_tokens
            .unwrap_or_else(|| estimate_tokens(&parsed.output));
        let ratio = if original_tokens == 0 {
            1.0
        } else {
            compressed_tokens as f64 / original_tokens as f64
        };

        Ok(CompressionOutcome {
            success: true,
            compressed_text: parsed.output,
            ratio,
            original_tokens,
            compressed_tokens,
            error: None,
        })
    }
}

#[async_trait]
impl CompressionAdapter for TokenCompanyClient {
    async fn compress(&self, text: &str, aggressiveness: f64) -> CompressionOutcome {
        if text.trim().chars().count() < MIN_COMPRESSIBLE_CHARS {
            return CompressionOutcome::unchanged(text);
        }

        match self.request(text, aggressiveness).await {
            Ok(outcome) => {
                tracing::debug!(
                    original_tokens = outcome.original_tokens,
                    compressed_tokens = outcome.compressed_tokens,
                    "compressed text"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "compression failed, keeping original text");
                CompressionOutcome::failed(text, e.categorized())
            }
        }
    }
}

/// Adapter for hosts without a compression service; always reports failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCompressor;

#[async_trait]
impl CompressionAdapter for NoopCompressor {
    async fn compress(&self, text: &str, _aggressiveness: f64) -> CompressionOutcome {
        CompressionOutcome::failed(text, "compression not configured")
    }
}
