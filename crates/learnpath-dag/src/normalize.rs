//! Prerequisite normalization.
//!
//! The oracle emits prerequisites in two shapes:
//!
//! - legacy: a bare id string, `"linear_algebra"`
//! - typed: `{"node_id": "..", "relationship": "..", "reasoning": ".."}`
//!   (`id` is accepted in place of `node_id`)
//!
//! Both are resolved here, once, into [`PrerequisiteEdge`]. Nothing downstream
//! sees the raw union. Objects are always kept: non-string `relationship`
//! values become [`Relationship::Other`] and non-string `reasoning` is
//! rendered as text. Entries that are neither strings, numbers nor objects
//! are counted and dropped.

use crate::model::{PrerequisiteEdge, Relationship};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Reasoning attached to legacy string prerequisites.
pub const LEGACY_REASONING: &str = "Legacy prerequisite - relationship inferred";

/// Reasoning attached to typed prerequisites that came without one.
pub const DEFAULT_REASONING: &str = "No reasoning provided";

/// A prerequisite as the oracle wrote it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawPrerequisite {
    LegacyRef(String),
    Typed(TypedPrerequisite),
    /// Nulls, booleans, nested arrays; dropped during normalization.
    Unsupported(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypedPrerequisite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl TypedPrerequisite {
    /// Read an oracle object field by field; `node_id` wins over `id`.
    pub fn from_object(fields: &Map<String, Value>) -> Self {
        let node_id = fields
            .get("node_id")
            .and_then(id_from_value)
            .or_else(|| fields.get("id").and_then(id_from_value));
        let relationship = fields.get("relationship").and_then(|v| match v {
            Value::Null => None,
            Value::String(label) => Some(label.clone()),
            other => Some(other.to_string()),
        });
        TypedPrerequisite {
            node_id,
            relationship,
            reasoning: fields.get("reasoning").and_then(|v| value_text(v, "; ")),
        }
    }
}

impl RawPrerequisite {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(node_id) => RawPrerequisite::LegacyRef(node_id),
            Value::Number(n) => RawPrerequisite::LegacyRef(n.to_string()),
            Value::Object(fields) => RawPrerequisite::Typed(TypedPrerequisite::from_object(&fields)),
            other => RawPrerequisite::Unsupported(other),
        }
    }

    /// Resolve into the canonical edge, or `None` for unsupported shapes.
    pub fn into_edge(self) -> Option<PrerequisiteEdge> {
        match self {
            RawPrerequisite::LegacyRef(node_id) => Some(PrerequisiteEdge {
                node_id,
                relationship: Relationship::Requires,
                reasoning: LEGACY_REASONING.to_string(),
            }),
            RawPrerequisite::Typed(typed) => Some(PrerequisiteEdge {
                node_id: typed.node_id.unwrap_or_default(),
                relationship: typed
                    .relationship
                    .as_deref()
                    .map(Relationship::parse)
                    .unwrap_or(Relationship::Requires),
                reasoning: typed
                    .reasoning
                    .unwrap_or_else(|| DEFAULT_REASONING.to_string()),
            }),
            RawPrerequisite::Unsupported(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for RawPrerequisite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RawPrerequisite::from_value)
    }
}

/// Normalize a prerequisite list, preserving order and duplicates.
pub fn normalize_prerequisites(raw: Vec<RawPrerequisite>) -> Vec<PrerequisiteEdge> {
    raw.into_iter().filter_map(RawPrerequisite::into_edge).collect()
}

/// Normalize straight from the oracle's JSON.
///
/// Returns the edges and the number of entries that could not be read as a
/// prerequisite. A lone string or object is treated as a one-element list.
pub fn normalize_prerequisite_value(value: Option<Value>) -> (Vec<PrerequisiteEdge>, usize) {
    let items = match value {
        None | Some(Value::Null) => return (Vec::new(), 0),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    };
    let mut skipped = 0;
    let mut edges = Vec::with_capacity(items.len());
    for item in items {
        match RawPrerequisite::from_value(item).into_edge() {
            Some(edge) => edges.push(edge),
            None => skipped += 1,
        }
    }
    (edges, skipped)
}

/// Text form of an untrusted JSON value: strings verbatim, arrays joined with
/// `separator`, null as absent, anything else as compact JSON.
pub fn value_text(value: &Value, separator: &str) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| value_text(item, separator))
                .collect::<Vec<_>>()
                .join(separator),
        ),
        other => Some(other.to_string()),
    }
}

/// Ids may arrive as strings or numbers; anything else counts as absent.
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Vec<RawPrerequisite> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn legacy_string_becomes_requires() {
        let edges = normalize_prerequisites(raw(json!(["calculus"])));
        assert_eq!(
            edges,
            vec![PrerequisiteEdge {
                node_id: "calculus".to_string(),
                relationship: Relationship::Requires,
                reasoning: LEGACY_REASONING.to_string(),
            }]
        );
    }

    #[test]
    fn typed_object_is_mapped_field_for_field() {
        let edges = normalize_prerequisites(raw(json!([
            {"node_id": "probability", "relationship": "builds_on", "reasoning": "uses expectations"},
            {"id": "sets"},
            {"node_id": 7, "relationship": "related"}
        ])));

        assert_eq!(edges[0].node_id, "probability");
        assert_eq!(edges[0].relationship, Relationship::BuildsOn);
        assert_eq!(edges[0].reasoning, "uses expectations");

        assert_eq!(edges[1].node_id, "sets");
        assert_eq!(edges[1].relationship, Relationship::Requires);
        assert_eq!(edges[1].reasoning, DEFAULT_REASONING);

        assert_eq!(edges[2].node_id, "7");
        assert_eq!(edges[2].relationship, Relationship::Related);
    }

    #[test]
    fn node_id_takes_precedence_over_id() {
        let edges = normalize_prerequisites(raw(json!([{"node_id": "a", "id": "b"}])));
        assert_eq!(edges[0].node_id, "a");
    }

    #[test]
    fn order_and_duplicates_are_preserved() {
        let edges = normalize_prerequisites(raw(json!([
            "b",
            {"node_id": "a", "relationship": "related", "reasoning": "x"},
            "b"
        ])));
        let ids: Vec<&str> = edges.iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "b"]);
    }

    #[test]
    fn unsupported_shapes_are_counted() {
        let (edges, skipped) = normalize_prerequisite_value(Some(json!([3, null, ["x"], "ok", true])));
        let ids: Vec<&str> = edges.iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "ok"]);
        assert_eq!(skipped, 3);

        let (single, skipped) = normalize_prerequisite_value(Some(json!("calculus")));
        assert_eq!(single[0].node_id, "calculus");
        assert_eq!(skipped, 0);
        assert_eq!(normalize_prerequisite_value(None), (Vec::new(), 0));
    }

    #[test]
    fn non_string_fields_keep_the_object() {
        let (edges, skipped) = normalize_prerequisite_value(Some(json!([
            {"node_id": "a", "relationship": "requires", "reasoning": ["defines limits", "uses them"]},
            {"node_id": "a", "relationship": 1, "reasoning": "x"},
            {"node_id": "a", "relationship": null, "reasoning": {"why": "limits"}}
        ])));

        assert_eq!(skipped, 0);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0].relationship, Relationship::Requires);
        assert_eq!(edges[0].reasoning, "defines limits; uses them");
        assert_eq!(edges[1].relationship, Relationship::Other("1".to_string()));
        assert_eq!(edges[1].reasoning, "x");
        assert_eq!(edges[2].relationship, Relationship::Requires);
        assert_eq!(edges[2].reasoning, r#"{"why":"limits"}"#);
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let once = normalize_prerequisites(raw(json!([
            "a",
            {"id": "b", "relationship": "related"},
            {"node_id": "c", "reasoning": ""}
        ])));
        let reparsed: Vec<RawPrerequisite> =
            serde_json::from_value(serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(normalize_prerequisites(reparsed), once);
    }
}
