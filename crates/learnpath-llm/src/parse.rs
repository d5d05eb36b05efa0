//! Shared parse contract for oracle replies.
//!
//! Precedence:
//! 1. if the reply contains a fenced code block, use its inner content
//! 2. parse directly
//! 3. otherwise parse the slice from the first `{` to the last `}`
//!
//! Anything that survives none of these is a hard error for the caller.

use crate::OracleError;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?i:json)?\s*([\s\S]*?)\s*```").expect("fence pattern is a valid regex")
    })
}

/// Parse an oracle reply into `T`.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, OracleError> {
    let body = fence_pattern()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    if body.is_empty() {
        return Err(OracleError::MalformedPayload("empty reply".to_string()));
    }

    let direct_err = match serde_json::from_str::<T>(body) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&body[start..=end])
            .map_err(|e| OracleError::MalformedPayload(format!("invalid JSON object: {e}"))),
        _ => Err(OracleError::MalformedPayload(format!(
            "reply is not JSON: {direct_err}"
        ))),
    }
}
