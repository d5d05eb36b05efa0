use thiserror::Error;

/// Errors raised while ingesting an oracle graph payload.
///
/// Only structural problems that make the payload unusable end up here;
/// graph-quality issues are reported as validation warnings instead.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("graph payload must be a JSON object, got {0}")]
    PayloadNotObject(&'static str),
    #[error("`nodes` must be a JSON array, got {0}")]
    NodesNotArray(&'static str),
    #[error("invalid node document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
