//! Node sets, oracle-graph ingestion and the assembled [`KnowledgeDag`].

use crate::error::{json_kind, DagError};
use crate::ids::IdGenerator;
use crate::model::{ConceptNode, Relationship};
use crate::normalize::{id_from_value, normalize_prerequisite_value};
use crate::validate::{relationship_counts, validate, ValidationReport};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// NodeSet
// ============================================================================

/// Insertion-ordered mapping of node id → [`ConceptNode`] with unique ids.
///
/// Serializes as a plain list in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSet {
    nodes: Vec<ConceptNode>,
    index: HashMap<String, usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, keeping the first node for each id.
    ///
    /// Returns the set and the ids of the dropped duplicates.
    pub fn from_nodes(nodes: impl IntoIterator<Item = ConceptNode>) -> (Self, Vec<String>) {
        let mut set = NodeSet::new();
        let mut duplicates = Vec::new();
        for node in nodes {
            if let Err(dup) = set.insert(node) {
                duplicates.push(dup.id);
            }
        }
        (set, duplicates)
    }

    /// Insert a node; hands it back if the id is already taken.
    pub fn insert(&mut self, node: ConceptNode) -> Result<(), ConceptNode> {
        if self.index.contains_key(&node.id) {
            return Err(node);
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ConceptNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn by_position(&self, position: usize) -> &ConceptNode {
        &self.nodes[position]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConceptNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn as_slice(&self) -> &[ConceptNode] {
        &self.nodes
    }

    pub fn into_vec(self) -> Vec<ConceptNode> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a ConceptNode;
    type IntoIter = std::slice::Iter<'a, ConceptNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl Serialize for NodeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nodes = Vec::<ConceptNode>::deserialize(deserializer)?;
        let (set, duplicates) = NodeSet::from_nodes(nodes);
        match duplicates.first() {
            Some(dup) => Err(serde::de::Error::custom(format!("duplicate node id {dup}"))),
            None => Ok(set),
        }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Result of turning the oracle's `{"nodes": [...]}` payload into a [`NodeSet`].
#[derive(Debug, Clone, Default)]
pub struct IngestedGraph {
    pub nodes: NodeSet,
    /// Ids of later nodes dropped because an earlier node already used the id.
    pub duplicate_ids: Vec<String>,
    /// Entries of `nodes` that were not JSON objects.
    pub skipped_entries: usize,
    /// Prerequisite entries that were neither ids nor objects.
    pub skipped_prerequisites: usize,
}

/// Ingest an untrusted oracle graph.
///
/// Missing ids are generated, missing `source_material_ids` default to empty,
/// and prerequisites are normalized. A missing `nodes` key yields an empty
/// graph; a `nodes` value that is not an array is an error.
pub fn ingest_oracle_graph(
    payload: &Value,
    ids: &dyn IdGenerator,
) -> Result<IngestedGraph, DagError> {
    let object = payload
        .as_object()
        .ok_or_else(|| DagError::PayloadNotObject(json_kind(payload)))?;

    let entries = match object.get("nodes") {
        None | Some(Value::Null) => return Ok(IngestedGraph::default()),
        Some(Value::Array(entries)) => entries,
        Some(other) => return Err(DagError::NodesNotArray(json_kind(other))),
    };

    let mut skipped_entries = 0;
    let mut skipped_prerequisites = 0;
    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::Object(fields) => {
                let (node, skipped) = node_from_oracle(fields.clone(), ids);
                skipped_prerequisites += skipped;
                nodes.push(node);
            }
            _ => skipped_entries += 1,
        }
    }

    let (nodes, duplicate_ids) = NodeSet::from_nodes(nodes);
    Ok(IngestedGraph {
        nodes,
        duplicate_ids,
        skipped_entries,
        skipped_prerequisites,
    })
}

/// Build one node; also returns how many prerequisite entries were unreadable.
fn node_from_oracle(mut fields: Map<String, Value>, ids: &dyn IdGenerator) -> (ConceptNode, usize) {
    let id = fields
        .remove("id")
        .as_ref()
        .and_then(id_from_value)
        .unwrap_or_else(|| ids.next_id());

    let label = match fields.remove("label") {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };

    let node_type = match fields.remove("type") {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => "concept".to_string(),
    };

    let depth = match fields.remove("depth") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.floor() as u64))
            .map(|d| d.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        _ => 0,
    };

    let mastery_likelihood = match fields.remove("mastery_likelihood") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5).clamp(0.0, 1.0),
        _ => 0.5,
    };

    let source_material_ids = match fields.remove("source_material_ids") {
        Some(Value::Array(items)) => items.iter().filter_map(id_from_value).collect(),
        _ => Vec::new(),
    };

    let (prerequisites, skipped) = normalize_prerequisite_value(fields.remove("prerequisites"));

    let node = ConceptNode {
        id,
        label,
        node_type,
        depth,
        mastery_likelihood,
        source_material_ids,
        prerequisites,
        extra: fields,
    };
    (node, skipped)
}

// ============================================================================
// Edges and metadata
// ============================================================================

/// Flattened edge record, as written to storage and the edge table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship: Relationship,
    pub reasoning: String,
}

/// One edge per prerequisite entry, in node order then prerequisite order.
pub fn build_edges(nodes: &NodeSet) -> Vec<FlatEdge> {
    nodes
        .iter()
        .flat_map(|node| {
            node.prerequisites.iter().map(move |prereq| FlatEdge {
                source: prereq.node_id.clone(),
                target: node.id.clone(),
                relationship: prereq.relationship.clone(),
                reasoning: prereq.reasoning.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagMetadata {
    pub total_nodes: usize,
    pub max_depth: u32,
    /// Nodes with no prerequisites.
    pub root_node_count: usize,
    pub relationship_distribution: BTreeMap<String, usize>,
    pub validation: ValidationReport,
}

/// The finished `{nodes, edges, metadata}` aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDag {
    pub nodes: NodeSet,
    pub edges: Vec<FlatEdge>,
    pub metadata: DagMetadata,
}

impl KnowledgeDag {
    /// Validate an ingested graph and derive its edges and metadata.
    ///
    /// Ingestion anomalies (duplicate ids, skipped node or prerequisite
    /// entries) are appended to the validation warnings.
    pub fn assemble(ingested: IngestedGraph) -> Self {
        let IngestedGraph {
            nodes,
            duplicate_ids,
            skipped_entries,
            skipped_prerequisites,
        } = ingested;

        let mut validation = validate(&nodes);
        for dup in &duplicate_ids {
            validation
                .warnings
                .push(format!("Duplicate node id {dup} dropped (first occurrence kept)"));
        }
        if skipped_entries > 0 {
            validation
                .warnings
                .push(format!("{skipped_entries} node entries were not JSON objects and were skipped"));
        }
        if skipped_prerequisites > 0 {
            validation.warnings.push(format!(
                "{skipped_prerequisites} prerequisite entries were neither ids nor objects and were skipped"
            ));
        }
        validation.valid = validation.warnings.is_empty();

        let metadata = DagMetadata {
            total_nodes: nodes.len(),
            max_depth: nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            root_node_count: nodes.iter().filter(|n| n.prerequisites.is_empty()).count(),
            relationship_distribution: relationship_counts(&nodes),
            validation,
        };

        Self {
            edges: build_edges(&nodes),
            nodes,
            metadata,
        }
    }

    pub fn from_nodes(nodes: NodeSet) -> Self {
        Self::assemble(IngestedGraph {
            nodes,
            ..IngestedGraph::default()
        })
    }

    pub fn total_edges(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialNodeIds;
    use crate::normalize::LEGACY_REASONING;
    use serde_json::json;

    #[test]
    fn ingestion_fills_defaults_and_keeps_extra_fields() {
        let ids = SequentialNodeIds::new();
        let graph = ingest_oracle_graph(
            &json!({"nodes": [
                {"label": "Limits", "depth": 0, "description": "epsilon-delta"},
                {"id": "derivatives", "label": "Derivatives", "depth": 1.0,
                 "mastery_likelihood": 1.7, "source_material_ids": ["m1", 42],
                 "prerequisites": ["node_gen_0"]}
            ]}),
            &ids,
        )
        .unwrap();

        let limits = graph.nodes.get("node_gen_0").unwrap();
        assert_eq!(limits.node_type, "concept");
        assert!(limits.source_material_ids.is_empty());
        assert_eq!(limits.mastery_likelihood, 0.5);
        assert_eq!(limits.extra.get("description"), Some(&json!("epsilon-delta")));

        let derivatives = graph.nodes.get("derivatives").unwrap();
        assert_eq!(derivatives.depth, 1);
        assert_eq!(derivatives.mastery_likelihood, 1.0);
        assert_eq!(derivatives.source_material_ids, vec!["m1", "42"]);
        assert_eq!(derivatives.prerequisites[0].reasoning, LEGACY_REASONING);
    }

    #[test]
    fn missing_nodes_key_is_an_empty_graph() {
        let graph = ingest_oracle_graph(&json!({"summary": "nothing"}), &SequentialNodeIds::new())
            .unwrap();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn non_array_nodes_is_an_error() {
        let err = ingest_oracle_graph(&json!({"nodes": "lots"}), &SequentialNodeIds::new())
            .unwrap_err();
        assert!(matches!(err, DagError::NodesNotArray("a string")));
        assert!(ingest_oracle_graph(&json!([1]), &SequentialNodeIds::new()).is_err());
    }

    #[test]
    fn duplicate_ids_keep_first_and_warn() {
        let ingested = ingest_oracle_graph(
            &json!({"nodes": [
                {"id": "a", "label": "First", "depth": 0},
                {"id": "a", "label": "Second", "depth": 1},
                "stray"
            ]}),
            &SequentialNodeIds::new(),
        )
        .unwrap();
        assert_eq!(ingested.duplicate_ids, vec!["a"]);
        assert_eq!(ingested.skipped_entries, 1);

        let dag = KnowledgeDag::assemble(ingested);
        assert_eq!(dag.nodes.get("a").unwrap().label, "First");
        assert!(!dag.metadata.validation.valid);
        assert_eq!(dag.metadata.validation.warnings.len(), 2);
    }

    #[test]
    fn loosely_typed_prerequisites_keep_their_edges() {
        let ingested = ingest_oracle_graph(
            &json!({"nodes": [
                {"id": "a", "label": "Limits", "depth": 0},
                {"id": "b", "label": "Derivatives", "depth": 1, "prerequisites": [
                    {"node_id": "a", "relationship": "requires", "reasoning": ["defines limits", "uses them"]},
                    {"node_id": "a", "relationship": 1, "reasoning": "x"}
                ]}
            ]}),
            &SequentialNodeIds::new(),
        )
        .unwrap();
        assert_eq!(ingested.skipped_prerequisites, 0);

        let dag = KnowledgeDag::assemble(ingested);
        let b = dag.nodes.get("b").unwrap();
        assert_eq!(b.prerequisites.len(), 2);
        assert_eq!(b.prerequisites[0].reasoning, "defines limits; uses them");
        assert_eq!(dag.edges.len(), 2);
        assert_eq!(dag.metadata.relationship_distribution["1"], 1);
    }

    #[test]
    fn unreadable_prerequisites_are_reported() {
        let ingested = ingest_oracle_graph(
            &json!({"nodes": [
                {"id": "a", "label": "Limits", "depth": 0},
                {"id": "b", "label": "Derivatives", "depth": 1, "prerequisites": ["a", null, [true]]}
            ]}),
            &SequentialNodeIds::new(),
        )
        .unwrap();
        assert_eq!(ingested.skipped_prerequisites, 2);

        let dag = KnowledgeDag::assemble(ingested);
        assert_eq!(dag.edges.len(), 1);
        assert!(!dag.metadata.validation.valid);
        assert!(dag
            .metadata
            .validation
            .warnings
            .iter()
            .any(|w| w.contains("2 prerequisite entries")));
    }

    #[test]
    fn edges_point_from_prerequisite_to_dependent() {
        let (nodes, _) = NodeSet::from_nodes(vec![
            ConceptNode::new("a", "A", 0),
            ConceptNode::new("b", "B", 1).with_prerequisite("a", Relationship::Requires, "r1"),
            ConceptNode::new("c", "C", 2)
                .with_prerequisite("b", Relationship::Requires, "r2")
                .with_prerequisite("a", Relationship::BuildsOn, "r3"),
        ]);

        let edges = build_edges(&nodes);
        let pairs: Vec<(&str, &str, &str)> = edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.relationship.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("a", "b", "requires"), ("b", "c", "requires"), ("a", "c", "builds_on")]
        );

        let dag = KnowledgeDag::from_nodes(nodes);
        assert_eq!(dag.metadata.total_nodes, 3);
        assert_eq!(dag.metadata.max_depth, 2);
        assert_eq!(dag.metadata.root_node_count, 1);
        assert_eq!(dag.metadata.relationship_distribution["requires"], 2);
        assert_eq!(dag.metadata.relationship_distribution["builds_on"], 1);
        assert_eq!(dag.metadata.relationship_distribution["related"], 0);
    }

    #[test]
    fn node_set_serializes_as_list() {
        let (nodes, _) = NodeSet::from_nodes(vec![ConceptNode::new("a", "A", 0)]);
        let value = serde_json::to_value(&nodes).unwrap();
        assert!(value.is_array());
        let back: NodeSet = serde_json::from_value(value).unwrap();
        assert_eq!(back, nodes);
    }
}
