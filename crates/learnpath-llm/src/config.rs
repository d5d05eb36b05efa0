//! Oracle configuration, loaded from the environment or built explicitly.

use crate::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};
use std::fmt;
use url::Url;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";
pub const GEMINI_BASE_URL_ENV: &str = "GEMINI_BASE_URL";
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const OPENROUTER_MODEL_ENV: &str = "OPENROUTER_MODEL";
pub const OPENROUTER_BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-001";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleProvider {
    Gemini,
    OpenRouter,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleConfigError {
    #[error("no oracle configured; set {GEMINI_API_KEY_ENV} or {OPENROUTER_API_KEY_ENV}")]
    NoProviderConfigured,
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: Url,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

// api_key stays out of logs
impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl OracleConfig {
    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self::build(OracleProvider::Gemini, api_key, model, DEFAULT_GEMINI_BASE_URL)
    }

    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self::build(
            OracleProvider::OpenRouter,
            api_key,
            model,
            DEFAULT_OPENROUTER_BASE_URL,
        )
    }

    fn build(provider: OracleProvider, api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            provider,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: Url::parse(base_url).expect("default base URL is valid"),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, OracleConfigError> {
        self.base_url = Url::parse(base_url).map_err(|source| OracleConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(self)
    }

    /// Load from environment variables.
    ///
    /// Precedence: Gemini (`GEMINI_API_KEY`), then OpenRouter (`OPENROUTER_API_KEY`).
    pub fn from_env() -> Result<Self, OracleConfigError> {
        if let Some(key) = env_var(GEMINI_API_KEY_ENV) {
            let model = env_var(GEMINI_MODEL_ENV).unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into());
            let config = Self::gemini(&key, &model);
            return match env_var(GEMINI_BASE_URL_ENV) {
                Some(url) => config.with_base_url(&url),
                None => Ok(config),
            };
        }

        if let Some(key) = env_var(OPENROUTER_API_KEY_ENV) {
            let model =
                env_var(OPENROUTER_MODEL_ENV).unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.into());
            let config = Self::openrouter(&key, &model);
            return match env_var(OPENROUTER_BASE_URL_ENV) {
                Some(url) => config.with_base_url(&url),
                None => Ok(config),
            };
        }

        Err(OracleConfigError::NoProviderConfigured)
    }

    /// `base_url` joined with `path`, tolerating a trailing slash on either side.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Trimmed, non-empty environment variable.
pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
