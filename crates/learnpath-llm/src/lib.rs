//! Learnpath LLM: the external text-generation and compression collaborators
//!
//! The pipeline never talks HTTP directly. It sees two narrow contracts:
//!
//! - [`TextOracle`]: `prompt → text`, where the text is expected to embed JSON
//!   (parsed with [`parse_json_reply`]).
//! - [`CompressionAdapter`]: `text, aggressiveness → CompressionOutcome`,
//!   best-effort and never fatal.
//!
//! Concrete clients ([`GeminiClient`], [`OpenRouterClient`],
//! [`TokenCompanyClient`]) are constructed by the host from explicit config and
//! injected; nothing in this crate is a lazily-initialised global.
//!
//! The oracle is **untrusted**: replies are parsed leniently and every graph
//! it proposes is re-validated downstream.

pub mod compression;
pub mod config;
pub mod error;
pub mod mock;
pub mod parse;
pub mod providers;

use async_trait::async_trait;
use std::time::Duration;

pub use compression::{
    estimate_tokens, preset, CompressionAdapter, CompressionConfig, CompressionError,
    CompressionOutcome, NoopCompressor, TokenCompanyClient,
};
pub use config::{OracleConfig, OracleConfigError, OracleProvider};
pub use error::OracleError;
pub use mock::{ScriptedOracle, StaticCompressor};
pub use parse::parse_json_reply;
pub use providers::{GeminiClient, OpenRouterClient, UnifiedOracle};

/// Sampling temperature used for every generation call.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Upper bound on generated tokens per call.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub prompt: String,
    /// Request-level budget; exceeding it yields [`OracleError::Timeout`].
    pub timeout: Duration,
}

impl OracleRequest {
    pub fn new(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            timeout,
        }
    }
}

/// Text-generation oracle.
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Send one prompt and return the raw reply text.
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError>;

    /// Short description (provider/model) for logs.
    fn describe(&self) -> String {
        "oracle".to_string()
    }
}
