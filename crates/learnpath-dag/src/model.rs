//! Core data model shared by every stage of the pipeline.

use crate::normalize::value_text;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// Materials
// ============================================================================

/// Kind of ingested material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    AuthoredPaper,
    ReadPaper,
    Notes,
    GoogleDoc,
    Coursework,
    #[serde(other)]
    Other,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::AuthoredPaper => "authored_paper",
            MaterialType::ReadPaper => "read_paper",
            MaterialType::Notes => "notes",
            MaterialType::GoogleDoc => "google_doc",
            MaterialType::Coursework => "coursework",
            MaterialType::Other => "other",
        }
    }

    /// Lenient parse; unknown labels become [`MaterialType::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "authored_paper" => MaterialType::AuthoredPaper,
            "read_paper" => MaterialType::ReadPaper,
            "notes" => MaterialType::Notes,
            "google_doc" => MaterialType::GoogleDoc,
            "coursework" => MaterialType::Coursework,
            _ => MaterialType::Other,
        }
    }
}

/// A unit of ingested content, read-only for the duration of a run.
///
/// `content` is already compression-normalized by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// Batch summaries
// ============================================================================

/// One demonstrated-knowledge claim: a concept and the evidence for it.
///
/// The oracle sometimes answers with bare strings; those become claims with no
/// evidence. Any other fields it attaches are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeClaim {
    pub concept: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub evidence: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys the oracle uses for a claim's concept, in order of preference.
const CONCEPT_KEYS: [&str; 4] = ["concept", "topic", "name", "skill"];

impl KnowledgeClaim {
    pub fn new(concept: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            evidence: evidence.into(),
            extra: Map::new(),
        }
    }

    /// Read one oracle entry. Strings and numbers are bare concepts; objects
    /// take the first non-null concept key. Anything else, including an
    /// object without a concept, is not a claim.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(concept) if !concept.trim().is_empty() => {
                Some(KnowledgeClaim::new(concept, ""))
            }
            Value::Number(n) => Some(KnowledgeClaim::new(n.to_string(), "")),
            Value::Object(mut fields) => {
                let key = CONCEPT_KEYS
                    .iter()
                    .find(|key| fields.get(**key).is_some_and(|v| !v.is_null()))?;
                let concept = fields
                    .remove(*key)
                    .as_ref()
                    .and_then(|v| value_text(v, ", "))
                    .filter(|c| !c.trim().is_empty())?;
                let evidence = fields
                    .remove("evidence")
                    .as_ref()
                    .and_then(|v| value_text(v, "; "))
                    .unwrap_or_default();
                Some(KnowledgeClaim {
                    concept,
                    evidence,
                    extra: fields,
                })
            }
            _ => None,
        }
    }

    /// Claims from an oracle list, skipping entries that are not claims.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Vec<Self> {
        values.into_iter().filter_map(KnowledgeClaim::from_value).collect()
    }
}

impl<'de> Deserialize<'de> for KnowledgeClaim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        KnowledgeClaim::from_value(value)
            .ok_or_else(|| serde::de::Error::custom("expected a knowledge claim"))
    }
}

/// Structured summary of one batch of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_index: usize,
    pub material_ids: Vec<String>,
    pub summary: String,
    pub demonstrated_knowledge: Vec<KnowledgeClaim>,
    pub domain_expertise: Vec<String>,
}

// ============================================================================
// Concept graph
// ============================================================================

/// Type of a prerequisite relationship.
///
/// Labels outside the three known kinds are kept verbatim in `Other`; they are
/// counted in the distribution but exempt from depth and reasoning checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relationship {
    /// Hard prerequisite.
    Requires,
    /// Helpful prior knowledge.
    BuildsOn,
    /// Topical association, no ordering implied.
    Related,
    Other(String),
}

impl Relationship {
    pub fn as_str(&self) -> &str {
        match self {
            Relationship::Requires => "requires",
            Relationship::BuildsOn => "builds_on",
            Relationship::Related => "related",
            Relationship::Other(label) => label,
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "requires" => Relationship::Requires,
            "builds_on" => Relationship::BuildsOn,
            "related" => Relationship::Related,
            other => Relationship::Other(other.to_string()),
        }
    }

    pub fn is_requires(&self) -> bool {
        matches!(self, Relationship::Requires)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Relationship {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Relationship {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Relationship::parse(&label))
    }
}

/// Canonical prerequisite edge, stored on the dependent node.
///
/// Points FROM the prerequisite (`node_id`) TO the node carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub node_id: String,
    pub relationship: Relationship,
    pub reasoning: String,
}

/// A vertex of the knowledge DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Oracle-assigned ordering hint; advisory only.
    pub depth: u32,
    pub mastery_likelihood: f64,
    #[serde(default)]
    pub source_material_ids: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteEdge>,
    /// Oracle fields outside the model (e.g. `description`), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConceptNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, depth: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: "concept".to_string(),
            depth,
            mastery_likelihood: 0.5,
            source_material_ids: Vec::new(),
            prerequisites: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_prerequisite(
        mut self,
        node_id: impl Into<String>,
        relationship: Relationship,
        reasoning: impl Into<String>,
    ) -> Self {
        self.prerequisites.push(PrerequisiteEdge {
            node_id: node_id.into(),
            relationship,
            reasoning: reasoning.into(),
        });
        self
    }

    /// Label for human-readable messages, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}
