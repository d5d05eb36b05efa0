use learnpath_dag::DagError;
use learnpath_llm::OracleError;
use learnpath_storage::StorageError;
use thiserror::Error;

/// Anything that ends a learning-path run.
///
/// Only the orchestrator turns these into a failed [`crate::LearningPathResult`];
/// the stages just return them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No materials found for this session")]
    NoMaterials,
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("oracle graph rejected: {0}")]
    Graph(#[from] DagError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to serialize learning path: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("learning path run was cancelled")]
    Cancelled,
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
