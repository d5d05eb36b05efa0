//! Stored record shapes: raw materials in, rows and job state out.

use chrono::{DateTime, Utc};
use learnpath_dag::{ConceptNode, FlatEdge, Material, MaterialType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `source` column value for nodes written by the pipeline.
pub const NODE_SOURCE: &str = "learning_path";

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_GOOGLE_DOC_TITLE: &str = "Google Doc";

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Material records
// ============================================================================

/// An uploaded academic material as the repository stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub material_type: Option<String>,
    #[serde(default)]
    pub compressed_text: Option<String>,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MaterialRecord {
    /// Prefer compressed text, fall back to the original; `None` when both are empty.
    pub fn into_material(self) -> Option<Material> {
        let content = non_blank(self.compressed_text).or_else(|| non_blank(self.original_text))?;
        Some(Material {
            id: self.id,
            title: non_blank(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            material_type: self
                .material_type
                .as_deref()
                .map(MaterialType::from_label)
                .unwrap_or(MaterialType::Other),
            content,
            notes: non_blank(self.notes),
        })
    }
}

/// A linked Google Doc; only its snippet is used as content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleDocRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_snippet: Option<String>,
}

impl GoogleDocRecord {
    pub fn into_material(self) -> Option<Material> {
        let content = non_blank(self.content_snippet)?;
        Some(Material {
            id: self.id,
            title: non_blank(self.title).unwrap_or_else(|| DEFAULT_GOOGLE_DOC_TITLE.to_string()),
            material_type: MaterialType::GoogleDoc,
            content,
            notes: None,
        })
    }
}

// ============================================================================
// Relational rows
// ============================================================================

/// `learning_paths` summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathRow {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub storage_path: String,
    pub total_nodes: usize,
    pub max_depth: u32,
}

/// `knowledge_nodes` row, one per concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNodeRow {
    pub id: String,
    pub session_id: String,
    pub learning_path_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub mastery_estimate: f64,
    pub depth_level: u32,
    pub source: String,
    pub is_llm_generated: bool,
}

impl KnowledgeNodeRow {
    pub fn from_node(node: &ConceptNode, session_id: &str, learning_path_id: &str) -> Self {
        Self {
            id: node.id.clone(),
            session_id: session_id.to_string(),
            learning_path_id: learning_path_id.to_string(),
            label: node.label.clone(),
            node_type: node.node_type.clone(),
            mastery_estimate: node.mastery_likelihood,
            depth_level: node.depth,
            source: NODE_SOURCE.to_string(),
            is_llm_generated: true,
        }
    }
}

/// `knowledge_prerequisites` row, one per flattened edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteRow {
    pub learning_path_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relationship: String,
    pub reasoning: String,
}

impl PrerequisiteRow {
    pub fn from_edge(edge: &FlatEdge, learning_path_id: &str) -> Self {
        Self {
            learning_path_id: learning_path_id.to_string(),
            source_node_id: edge.source.clone(),
            target_node_id: edge.target.clone(),
            relationship: edge.relationship.as_str().to_string(),
            reasoning: edge.reasoning.clone(),
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    BatchProcessing,
    Summarizing,
    Decomposing,
    Storing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::BatchProcessing => "batch_processing",
            JobStatus::Summarizing => "summarizing",
            JobStatus::Decomposing => "decomposing",
            JobStatus::Storing => "storing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub batches_processed: usize,
    pub total_batches: usize,
}

/// Current state of one job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: &str, status: JobStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            progress: None,
            error_message: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply a status update. Absent fields keep their previous value.
    pub fn apply(
        &mut self,
        status: JobStatus,
        progress: Option<JobProgress>,
        error_message: Option<&str>,
    ) {
        let now = Utc::now();
        self.status = status;
        if let Some(progress) = progress {
            self.progress = Some(progress);
        }
        if let Some(message) = error_message {
            self.error_message = Some(message.to_string());
        }
        if status == JobStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }
}
