//! Learnpath Storage: the pipeline's durable collaborators
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────┐      ┌──────────────────────┐
//! │  MaterialRepository  │─────►│                  │─────►│   ResultPersister    │
//! │  (user, session)     │      │    pipeline      │      │  document + rows     │
//! └──────────────────────┘      │                  │      └──────────────────────┘
//!                               │                  │      ┌──────────────────────┐
//!                               │                  │─────►│    JobStatusSink     │
//!                               └──────────────────┘      │  status transitions  │
//!                                                         └──────────────────────┘
//! ```
//!
//! Two backends implement all three contracts:
//!
//! - [`InMemoryStore`]: shared maps behind a lock, for tests and embedding.
//! - [`FsStore`]: a directory tree of JSON files, used by the CLI.
//!
//! Object storage is write-once: storing a document at an occupied path fails
//! with [`StorageError::AlreadyExists`] and the caller decides whether to
//! delete and retry.

pub mod error;
pub mod fs;
pub mod memory;
pub mod records;


use async_trait::async_trait;
use learnpath_dag::Material;

pub use error::StorageError;
pub use fs::{FsStore, KNOWLEDGE_NODES_TABLE, LEARNING_PATHS_TABLE, PREREQUISITES_TABLE};
pub use memory::InMemoryStore;
pub use records::{
    GoogleDocRecord, JobProgress, JobRecord, JobStatus, KnowledgeNodeRow, LearningPathRow,
    MaterialRecord, PrerequisiteRow, NODE_SOURCE,
};

/// Reads the materials of one learning session.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// Materials in repository order, content already compression-normalized.
    async fn fetch_materials(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Material>, StorageError>;
}

/// Writes a finished learning path.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    async fn store_document(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;
    async fn delete_document(&self, path: &str) -> Result<(), StorageError>;
    async fn insert_learning_path(&self, row: &LearningPathRow) -> Result<(), StorageError>;
    async fn insert_knowledge_nodes(&self, rows: &[KnowledgeNodeRow]) -> Result<(), StorageError>;
    async fn insert_prerequisites(&self, rows: &[PrerequisiteRow]) -> Result<(), StorageError>;
}

/// Receives job status transitions.
#[async_trait]
pub trait JobStatusSink: Send + Sync {
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: Option<JobProgress>,
        error_message: Option<&str>,
    ) -> Result<(), StorageError>;
}

/// Convert raw records into materials: academic records first, then Google
/// Doc snippets, dropping anything without content.
pub fn collect_materials(
    records: impl IntoIterator<Item = MaterialRecord>,
    google_docs: impl IntoIterator<Item = GoogleDocRecord>,
) -> Vec<Material> {
    records
        .into_iter()
        .filter_map(MaterialRecord::into_material)
        .chain(google_docs.into_iter().filter_map(GoogleDocRecord::into_material))
        .collect()
}
