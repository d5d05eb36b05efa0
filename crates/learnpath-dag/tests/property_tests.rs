//! Property-based tests for normalization and validation.

use learnpath_dag::validate::detect_cycles;
use learnpath_dag::*;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategies
// ============================================================================

fn node_id_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn relationship_label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("requires".to_string()),
        Just("builds_on".to_string()),
        Just("related".to_string()),
        "[a-z_]{3,12}",
    ]
}

fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,12}".prop_map(Value::String),
    ]
}

/// Either a legacy id string or a (possibly partial) typed object.
fn raw_prerequisite_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        node_id_strategy().prop_map(Value::String),
        (
            node_id_strategy(),
            any::<bool>(),
            proptest::option::of(relationship_label_strategy()),
            proptest::option::of(".{0,20}"),
        )
            .prop_map(|(id, use_node_id, relationship, reasoning)| {
                let mut obj = serde_json::Map::new();
                let key = if use_node_id { "node_id" } else { "id" };
                obj.insert(key.to_string(), json!(id));
                if let Some(rel) = relationship {
                    obj.insert("relationship".to_string(), json!(rel));
                }
                if let Some(reasoning) = reasoning {
                    obj.insert("reasoning".to_string(), json!(reasoning));
                }
                Value::Object(obj)
            }),
    ]
}

// ============================================================================
// Normalization
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalization_is_idempotent(items in prop::collection::vec(raw_prerequisite_strategy(), 0..12)) {
        let raw: Vec<RawPrerequisite> = serde_json::from_value(Value::Array(items)).unwrap();
        let once = normalize_prerequisites(raw);

        let again: Vec<RawPrerequisite> =
            serde_json::from_value(serde_json::to_value(&once).unwrap()).unwrap();
        prop_assert_eq!(normalize_prerequisites(again), once);
    }

    #[test]
    fn normalization_preserves_length_and_order(items in prop::collection::vec(raw_prerequisite_strategy(), 0..12)) {
        let expected_ids: Vec<String> = items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Object(obj) => obj
                    .get("node_id")
                    .or_else(|| obj.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => unreachable!(),
            })
            .collect();

        let raw: Vec<RawPrerequisite> = serde_json::from_value(Value::Array(items)).unwrap();
        let edges = normalize_prerequisites(raw);
        let ids: Vec<String> = edges.into_iter().map(|e| e.node_id).collect();
        prop_assert_eq!(ids, expected_ids);
    }

    #[test]
    fn object_prerequisites_are_never_dropped(
        fields in prop::collection::vec((node_id_strategy(), json_leaf_strategy(), json_leaf_strategy()), 0..10)
    ) {
        let items: Vec<Value> = fields
            .into_iter()
            .map(|(id, relationship, reasoning)| json!({
                "node_id": id,
                "relationship": relationship,
                "reasoning": [reasoning],
            }))
            .collect();
        let expected = items.len();

        let raw: Vec<RawPrerequisite> = serde_json::from_value(Value::Array(items)).unwrap();
        prop_assert_eq!(normalize_prerequisites(raw).len(), expected);
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Edges that only ever point at earlier nodes can never form a cycle.
    #[test]
    fn forward_only_graphs_are_acyclic(
        picks in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..30)
    ) {
        let mut nodes = Vec::new();
        for (i, targets) in picks.iter().enumerate() {
            let mut node = ConceptNode::new(format!("n{i}"), format!("N{i}"), i as u32);
            if i > 0 {
                for target in targets {
                    let t = target.index(i);
                    node = node.with_prerequisite(format!("n{t}"), Relationship::Requires, "earlier");
                }
            }
            nodes.push(node);
        }
        let (set, _) = NodeSet::from_nodes(nodes);
        prop_assert!(detect_cycles(&set).is_empty());

        // depth grows with position, so no depth warnings either
        let report = validate(&set);
        prop_assert!(report.warnings.iter().all(|w| !w.starts_with("Depth violation")));
    }

    #[test]
    fn flattened_edges_match_prerequisite_count(
        picks in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..20)
    ) {
        let nodes: Vec<ConceptNode> = picks
            .iter()
            .enumerate()
            .map(|(i, targets)| {
                targets.iter().fold(ConceptNode::new(format!("n{i}"), "", 0), |node, t| {
                    node.with_prerequisite(format!("n{}", t.index(picks.len())), Relationship::Related, "r")
                })
            })
            .collect();
        let expected: usize = nodes.iter().map(|n| n.prerequisites.len()).sum();
        let dag = KnowledgeDag::from_nodes(NodeSet::from_nodes(nodes).0);
        prop_assert_eq!(dag.edges.len(), expected);
        prop_assert_eq!(dag.metadata.relationship_distribution.values().sum::<usize>(), expected);
    }
}
