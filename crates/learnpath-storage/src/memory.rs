//! In-memory backend.

use crate::records::{
    GoogleDocRecord, JobProgress, JobRecord, JobStatus, KnowledgeNodeRow, LearningPathRow,
    MaterialRecord, PrerequisiteRow,
};
use crate::{collect_materials, JobStatusSink, MaterialRepository, ResultPersister, StorageError};
use async_trait::async_trait;
use learnpath_dag::Material;
use parking_lot::RwLock;
use std::collections::HashMap;

type SessionKey = (String, String);

#[derive(Default)]
struct Inner {
    materials: HashMap<SessionKey, Vec<MaterialRecord>>,
    google_docs: HashMap<SessionKey, Vec<GoogleDocRecord>>,
    documents: HashMap<String, Vec<u8>>,
    learning_paths: Vec<LearningPathRow>,
    knowledge_nodes: Vec<KnowledgeNodeRow>,
    prerequisites: Vec<PrerequisiteRow>,
    jobs: HashMap<String, JobRecord>,
    job_history: Vec<(String, JobRecord)>,
}

/// All three storage contracts over shared maps.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&self, user_id: &str, session_id: &str, record: MaterialRecord) {
        self.inner
            .write()
            .materials
            .entry((user_id.to_string(), session_id.to_string()))
            .or_default()
            .push(record);
    }

    pub fn add_google_doc(&self, user_id: &str, session_id: &str, record: GoogleDocRecord) {
        self.inner
            .write()
            .google_docs
            .entry((user_id.to_string(), session_id.to_string()))
            .or_default()
            .push(record);
    }

    /// Occupy a document path, e.g. with the output of an earlier run.
    pub fn put_document(&self, path: &str, bytes: &[u8]) {
        self.inner
            .write()
            .documents
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn document(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.read().documents.get(path).cloned()
    }

    pub fn learning_paths(&self) -> Vec<LearningPathRow> {
        self.inner.read().learning_paths.clone()
    }

    pub fn knowledge_nodes(&self) -> Vec<KnowledgeNodeRow> {
        self.inner.read().knowledge_nodes.clone()
    }

    pub fn prerequisites(&self) -> Vec<PrerequisiteRow> {
        self.inner.read().prerequisites.clone()
    }

    pub fn job(&self, job_id: &str) -> Option<JobRecord> {
        self.inner.read().jobs.get(job_id).cloned()
    }

    /// Every state a job passed through, oldest first.
    pub fn job_history(&self, job_id: &str) -> Vec<JobRecord> {
        self.inner
            .read()
            .job_history
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[async_trait]
impl MaterialRepository for InMemoryStore {
    async fn fetch_materials(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Material>, StorageError> {
        let inner = self.inner.read();
        let key = (user_id.to_string(), session_id.to_string());
        Ok(collect_materials(
            inner.materials.get(&key).cloned().unwrap_or_default(),
            inner.google_docs.get(&key).cloned().unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ResultPersister for InMemoryStore {
    async fn store_document(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if inner.documents.contains_key(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_string(),
            });
        }
        inner.documents.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<(), StorageError> {
        self.inner.write().documents.remove(path);
        Ok(())
    }

    async fn insert_learning_path(&self, row: &LearningPathRow) -> Result<(), StorageError> {
        self.inner.write().learning_paths.push(row.clone());
        Ok(())
    }

    async fn insert_knowledge_nodes(&self, rows: &[KnowledgeNodeRow]) -> Result<(), StorageError> {
        self.inner.write().knowledge_nodes.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_prerequisites(&self, rows: &[PrerequisiteRow]) -> Result<(), StorageError> {
        self.inner.write().prerequisites.extend_from_slice(rows);
        Ok(())
    }
}

#[async_trait]
impl JobStatusSink for InMemoryStore {
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: Option<JobProgress>,
        error_message: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let record = inner
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(|| JobRecord::new(job_id, status));
        record.apply(status, progress, error_message);
        let snapshot = record.clone();
        inner.job_history.push((job_id.to_string(), snapshot));
        Ok(())
    }
}
