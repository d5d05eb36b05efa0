//! HTTP oracle providers.
//!
//! Both clients send a single user prompt and return the first candidate's
//! text. Request timeouts come from [`OracleRequest::timeout`], not from the
//! client, so each pipeline stage can budget its own calls.

use crate::config::{OracleConfig, OracleConfigError, OracleProvider};
use crate::{OracleError, OracleRequest, TextOracle};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Longest error body kept in [`OracleError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 500;

fn build_http_client() -> Result<Client, OracleConfigError> {
    Ok(Client::builder().build()?)
}

async fn check_status(response: Response) -> Result<Response, OracleError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(OracleError::RateLimited { retry_after });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OracleError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }
    Ok(response)
}

async fn read_json(response: Response) -> Result<serde_json::Value, OracleError> {
    response
        .json()
        .await
        .map_err(|e| OracleError::MalformedPayload(format!("response body is not JSON: {e}")))
}

fn non_empty(text: Option<&str>) -> Result<String, OracleError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        _ => Err(OracleError::EmptyReply),
    }
}

// ============================================================================
// Gemini
// ============================================================================

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    config: OracleConfig,
}

impl GeminiClient {
    pub fn new(config: OracleConfig) -> Result<Self, OracleConfigError> {
        Ok(Self {
            client: build_http_client()?,
            config,
        })
    }

    fn body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        })
    }

    fn extract_text(data: &serde_json::Value) -> Result<String, OracleError> {
        non_empty(data["candidates"][0]["content"]["parts"][0]["text"].as_str())
    }
}

#[async_trait]
impl TextOracle for GeminiClient {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = self.config.endpoint(&format!(
            "v1beta/models/{}:generateContent",
            self.config.model
        ));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(request.timeout)
            .json(&self.body(&request.prompt))
            .send()
            .await
            .map_err(|e| OracleError::from_reqwest("gemini", request.timeout, e))?;

        let data = read_json(check_status(response).await?).await?;
        Self::extract_text(&data)
    }

    fn describe(&self) -> String {
        format!("gemini/{}", self.config.model)
    }
}

// ============================================================================
// OpenRouter (OpenAI-compatible chat completions)
// ============================================================================

pub struct OpenRouterClient {
    client: Client,
    config: OracleConfig,
}

impl OpenRouterClient {
    pub fn new(config: OracleConfig) -> Result<Self, OracleConfigError> {
        Ok(Self {
            client: build_http_client()?,
            config,
        })
    }

    fn body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_output_tokens,
        })
    }

    fn extract_text(data: &serde_json::Value) -> Result<String, OracleError> {
        non_empty(data["choices"][0]["message"]["content"].as_str())
    }
}

#[async_trait]
impl TextOracle for OpenRouterClient {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = self.config.endpoint("chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(request.timeout)
            .json(&self.body(&request.prompt))
            .send()
            .await
            .map_err(|e| OracleError::from_reqwest("openrouter", request.timeout, e))?;

        let data = read_json(check_status(response).await?).await?;
        Self::extract_text(&data)
    }

    fn describe(&self) -> String {
        format!("openrouter/{}", self.config.model)
    }
}

// ============================================================================
// Unified client
// ============================================================================

/// Dispatches to the provider named in [`OracleConfig`].
pub enum UnifiedOracle {
    Gemini(GeminiClient),
    OpenRouter(OpenRouterClient),
}

impl UnifiedOracle {
    pub fn from_config(config: OracleConfig) -> Result<Self, OracleConfigError> {
        Ok(match config.provider {
            OracleProvider::Gemini => Self::Gemini(GeminiClient::new(config)?),
            OracleProvider::OpenRouter => Self::OpenRouter(OpenRouterClient::new(config)?),
        })
    }

    pub fn from_env() -> Result<Self, OracleConfigError> {
        Self::from_config(OracleConfig::from_env()?)
    }
}

#[async_trait]
impl TextOracle for UnifiedOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        match self {
            Self::Gemini(c) => c.generate(request).await,
            Self::OpenRouter(c) => c.generate(request).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Gemini(c) => c.describe(),
            Self::OpenRouter(c) => c.describe(),
        }
    }
}
