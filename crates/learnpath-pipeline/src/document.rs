//! The stored learning-path document and the run result.

use chrono::{DateTime, Utc};
use learnpath_dag::{BatchSummary, DagMetadata, FlatEdge, KnowledgeDag, NodeSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DOCUMENT_VERSION: &str = "1.0";

/// Batch membership and domains, without the summary text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDigest {
    pub batch_index: usize,
    pub material_ids: Vec<String>,
    pub domains: Vec<String>,
}

impl From<&BatchSummary> for BatchDigest {
    fn from(summary: &BatchSummary) -> Self {
        Self {
            batch_index: summary.batch_index,
            material_ids: summary.material_ids.clone(),
            domains: summary.domain_expertise.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathDocument {
    pub version: String,
    pub learning_path_id: String,
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub metadata: DagMetadata,
    pub nodes: NodeSet,
    pub edges: Vec<FlatEdge>,
    pub batch_summaries: Vec<BatchDigest>,
}

impl LearningPathDocument {
    pub fn new(
        learning_path_id: &str,
        user_id: &str,
        session_id: &str,
        dag: KnowledgeDag,
        summaries: &[BatchSummary],
    ) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            learning_path_id: learning_path_id.to_string(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            metadata: dag.metadata,
            nodes: dag.nodes,
            edges: dag.edges,
            batch_summaries: summaries.iter().map(BatchDigest::from).collect(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Terminal output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_path_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    pub total_nodes: usize,
    pub max_depth: u32,
    pub relationship_distribution: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LearningPathResult {
    pub fn completed(document: &LearningPathDocument, storage_path: &str) -> Self {
        Self {
            success: true,
            learning_path_id: Some(document.learning_path_id.clone()),
            storage_path: Some(storage_path.to_string()),
            total_nodes: document.metadata.total_nodes,
            max_depth: document.metadata.max_depth,
            relationship_distribution: document.metadata.relationship_distribution.clone(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            learning_path_id: None,
            storage_path: None,
            total_nodes: 0,
            max_depth: 0,
            relationship_distribution: BTreeMap::new(),
            error: Some(error.into()),
        }
    }
}
