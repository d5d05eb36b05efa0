//! Pedagogical validation of a concept graph.
//!
//! Every check is advisory: it produces human-readable warnings and never
//! rejects the graph. `valid` is simply "no warnings".
//!
//! Checks, in order:
//! 1. cycles over all prerequisite edges (first three reported)
//! 2. prerequisite references that resolve to no node
//! 3. `requires` edges whose prerequisite is not strictly shallower
//! 4. relationship mix: `requires` ≥ 50%, `related` ≤ 20%
//! 5. `requires` edges without a real reasoning string
//!
//! Duplicate edges between the same pair are checked independently, in the
//! order they are listed.

use crate::graph::NodeSet;
use crate::model::{ConceptNode, Relationship};
use crate::normalize::DEFAULT_REASONING;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_REQUIRES_RATIO: f64 = 0.5;
pub const MAX_RELATED_RATIO: f64 = 0.2;
pub const MAX_REPORTED_CYCLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub relationship_counts: BTreeMap<String, usize>,
}

/// Run all checks. Pure and deterministic.
pub fn validate(nodes: &NodeSet) -> ValidationReport {
    let mut warnings = Vec::new();

    let cycles = detect_cycles(nodes);
    if !cycles.is_empty() {
        let rendered: Vec<String> = cycles
            .iter()
            .take(MAX_REPORTED_CYCLES)
            .map(|cycle| render_path(nodes, cycle))
            .collect();
        warnings.push(format!(
            "Circular dependencies detected: {}",
            rendered.join("; ")
        ));
    }

    warnings.extend(reference_warnings(nodes));
    warnings.extend(depth_violations(nodes));

    let counts = relationship_counts(nodes);
    warnings.extend(distribution_warnings(&counts));

    let missing = missing_reasoning_count(nodes);
    if missing > 0 {
        warnings.push(format!(
            "{missing} 'requires' relationships missing reasoning"
        ));
    }

    ValidationReport {
        valid: warnings.is_empty(),
        warnings,
        relationship_counts: counts,
    }
}

// ============================================================================
// Cycle detection
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not yet visited.
    White,
    /// On the current DFS stack.
    Gray,
    /// Fully explored.
    Black,
}

/// Find cycles with an iterative white/gray/black DFS over every prerequisite
/// edge, regardless of relationship type.
///
/// Each cycle is returned as an id path that starts and ends on the same node,
/// e.g. `["a", "b", "c", "a"]`. Black nodes are never re-expanded, so the
/// traversal is O(V + E) even with diamond-shaped dependencies. This is not an
/// exhaustive enumeration of all elementary cycles.
pub fn detect_cycles(nodes: &NodeSet) -> Vec<Vec<String>> {
    let mut color = vec![Color::White; nodes.len()];
    let mut cycles = Vec::new();

    for root in 0..nodes.len() {
        if color[root] != Color::White {
            continue;
        }

        // (node position, index of the next prerequisite to follow)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = Color::Gray;

        while let Some(&(current, next_edge)) = stack.last() {
            let prerequisites = &nodes.by_position(current).prerequisites;
            if next_edge >= prerequisites.len() {
                color[current] = Color::Black;
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let Some(target) = nodes.position(&prerequisites[next_edge].node_id) else {
                continue;
            };

            match color[target] {
                Color::White => {
                    color[target] = Color::Gray;
                    stack.push((target, 0));
                }
                Color::Gray => {
                    let start = stack
                        .iter()
                        .position(|&(position, _)| position == target)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|&(position, _)| nodes.by_position(position).id.clone())
                        .collect();
                    cycle.push(nodes.by_position(target).id.clone());
                    cycles.push(cycle);
                }
                Color::Black => {}
            }
        }
    }

    cycles
}

fn render_path(nodes: &NodeSet, ids: &[String]) -> String {
    ids.iter()
        .map(|id| nodes.get(id).map(ConceptNode::display_name).unwrap_or(id.as_str()))
        .collect::<Vec<_>>()
        .join(" -> ")
}

// ============================================================================
// Reference, depth and distribution checks
// ============================================================================

/// Dangling prerequisite references and prerequisites with no target id.
pub fn reference_warnings(nodes: &NodeSet) -> Vec<String> {
    let mut warnings = Vec::new();
    for node in nodes {
        for prereq in &node.prerequisites {
            if prereq.node_id.is_empty() {
                warnings.push(format!(
                    "Node {} has a prerequisite with no target id",
                    node.id
                ));
            } else if !nodes.contains(&prereq.node_id) {
                warnings.push(format!(
                    "Node {} references non-existent prerequisite {}",
                    node.id, prereq.node_id
                ));
            }
        }
    }
    warnings
}

/// `requires` edges where the prerequisite is at the same depth or deeper.
pub fn depth_violations(nodes: &NodeSet) -> Vec<String> {
    let mut warnings = Vec::new();
    for node in nodes {
        for prereq in &node.prerequisites {
            if !prereq.relationship.is_requires() {
                continue;
            }
            let Some(required) = nodes.get(&prereq.node_id) else {
                continue;
            };
            if required.depth >= node.depth {
                warnings.push(format!(
                    "Depth violation: {} (depth {}) requires {} (depth {})",
                    node.display_name(),
                    node.depth,
                    required.display_name(),
                    required.depth
                ));
            }
        }
    }
    warnings
}

/// Edge counts per relationship label. The three known labels are always present.
pub fn relationship_counts(nodes: &NodeSet) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = [
        Relationship::Requires,
        Relationship::BuildsOn,
        Relationship::Related,
    ]
    .iter()
    .map(|rel| (rel.as_str().to_string(), 0))
    .collect();

    for node in nodes {
        for prereq in &node.prerequisites {
            *counts
                .entry(prereq.relationship.as_str().to_string())
                .or_insert(0) += 1;
        }
    }
    counts
}

fn distribution_warnings(counts: &BTreeMap<String, usize>) -> Vec<String> {
    let total: usize = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let ratio = |label: &str| counts.get(label).copied().unwrap_or(0) as f64 / total as f64;
    let requires = ratio(Relationship::Requires.as_str());
    let related = ratio(Relationship::Related.as_str());

    let mut warnings = Vec::new();
    if requires < MIN_REQUIRES_RATIO {
        warnings.push(format!(
            "Low 'requires' ratio: {:.1}% (should be >50%)",
            requires * 100.0
        ));
    }
    if related > MAX_RELATED_RATIO {
        warnings.push(format!(
            "High 'related' ratio: {:.1}% (should be <20%)",
            related * 100.0
        ));
    }
    warnings
}

/// `requires` edges whose reasoning is blank or the normalization default.
pub fn missing_reasoning_count(nodes: &NodeSet) -> usize {
    nodes
        .iter()
        .flat_map(|node| node.prerequisites.iter())
        .filter(|prereq| prereq.relationship.is_requires())
        .filter(|prereq| {
            let reasoning = prereq.reasoning.trim();
            reasoning.is_empty() || reasoning == DEFAULT_REASONING
        })
        .count()
}
