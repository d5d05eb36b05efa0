use std::time::Duration;
use thiserror::Error;

/// Failure of a single oracle call.
///
/// Variants separate transport problems, non-2xx answers and unusable
/// payloads so callers can log them distinctly. None of them is retried here.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("network error calling {provider}: {message}")]
    Network { provider: String, message: String },
    #[error("oracle request timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("oracle reply contained no text")]
    EmptyReply,
    #[error("malformed oracle payload: {0}")]
    MalformedPayload(String),
}

impl OracleError {
    /// Coarse category for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Network { .. } => "network",
            OracleError::Timeout { .. } => "timeout",
            OracleError::Status { .. } | OracleError::RateLimited { .. } => "status",
            OracleError::EmptyReply | OracleError::MalformedPayload(_) => "malformed",
        }
    }

    pub(crate) fn from_reqwest(provider: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout { after: timeout }
        } else {
            OracleError::Network {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}
