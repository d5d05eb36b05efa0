use learnpath_llm::{parse_json_reply, OracleError, OracleRequest, TextOracle};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Send one prompt and parse the reply as JSON.
///
/// The timeout is enforced here as well as passed down in the request, so an
/// oracle that ignores [`OracleRequest::timeout`] still cannot stall a stage.
pub async fn ask_json<T: DeserializeOwned>(
    oracle: &dyn TextOracle,
    prompt: String,
    timeout: Duration,
) -> Result<T, OracleError> {
    tracing::debug!(
        oracle = %oracle.describe(),
        prompt_chars = prompt.chars().count(),
        timeout_secs = timeout.as_secs_f64(),
        "calling oracle"
    );
    let request = OracleRequest::new(prompt, timeout);
    let reply = tokio::time::timeout(timeout, oracle.generate(&request))
        .await
        .map_err(|_| OracleError::Timeout { after: timeout })??;
    parse_json_reply(&reply)
}
