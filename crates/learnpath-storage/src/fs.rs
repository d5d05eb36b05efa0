//! Filesystem backend: a directory of JSON files.
//!
//! ```text
//! <root>/
//!   materials/<user>/<session>/*.json               MaterialRecord
//!   materials/<user>/<session>/google_docs/*.json   GoogleDocRecord
//!   documents/<user>/<session>/learning_path.json   stored documents
//!   tables/{learning_paths,knowledge_nodes,knowledge_prerequisites}.jsonl
//!   jobs/<job_id>.json                              JobRecord
//! ```

use crate::records::{
    GoogleDocRecord, JobProgress, JobRecord, JobStatus, KnowledgeNodeRow, LearningPathRow,
    MaterialRecord, PrerequisiteRow,
};
use crate::{collect_materials, JobStatusSink, MaterialRepository, ResultPersister, StorageError};
use async_trait::async_trait;
use learnpath_dag::Material;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const LEARNING_PATHS_TABLE: &str = "learning_paths";
pub const KNOWLEDGE_NODES_TABLE: &str = "knowledge_nodes";
pub const PREREQUISITES_TABLE: &str = "knowledge_prerequisites";

pub struct FsStore {
    root: PathBuf,
    // serializes table appends and job read-modify-write
    write_lock: Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn materials_dir(&self, user_id: &str, session_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .root
            .join("materials")
            .join(safe_relative(user_id)?)
            .join(safe_relative(session_id)?))
    }

    fn document_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join("documents").join(safe_relative(path)?))
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join("tables").join(format!("{table}.jsonl"))
    }

    fn job_path(&self, job_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .root
            .join("jobs")
            .join(format!("{}.json", safe_relative(job_id)?.display())))
    }

    pub async fn read_document(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.document_path(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("document {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn job(&self, job_id: &str) -> Result<Option<JobRecord>, StorageError> {
        let file = self.job_path(job_id)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rows of one table, in insertion order.
    pub async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StorageError> {
        let contents = match tokio::fs::read_to_string(self.table_path(table)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    async fn append_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), StorageError> {
        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, row)?;
            buffer.push(b'\n');
        }

        let path = self.table_path(table);
        ensure_parent(&path).await?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Reject absolute paths and `..` so every key stays under the store root.
fn safe_relative(key: &str) -> Result<PathBuf, StorageError> {
    let path = Path::new(key);
    let ok = !key.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if ok {
        Ok(path.to_path_buf())
    } else {
        Err(StorageError::Backend(format!("invalid storage key {key:?}")))
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Parse every `*.json` file directly inside `dir`, sorted by file name.
/// A missing directory reads as empty.
async fn read_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StorageError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some("json")
        {
            files.push(path);
        }
    }
    files.sort();

    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(&file).await?;
        let record = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Backend(format!("failed to parse {}: {e}", file.display()))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[async_trait]
impl MaterialRepository for FsStore {
    async fn fetch_materials(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Material>, StorageError> {
        let dir = self.materials_dir(user_id, session_id)?;
        let records: Vec<MaterialRecord> = read_json_dir(&dir).await?;
        let google_docs: Vec<GoogleDocRecord> = read_json_dir(&dir.join("google_docs")).await?;
        tracing::debug!(
            dir = %dir.display(),
            records = records.len(),
            google_docs = google_docs.len(),
            "read material records"
        );
        Ok(collect_materials(records, google_docs))
    }
}

#[async_trait]
impl ResultPersister for FsStore {
    async fn store_document(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let file = self.document_path(path)?;
        ensure_parent(&file).await?;

        let mut handle = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file)
            .await
        {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        handle.write_all(bytes).await?;
        handle.flush().await?;
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<(), StorageError> {
        let file = self.document_path(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_learning_path(&self, row: &LearningPathRow) -> Result<(), StorageError> {
        self.append_rows(LEARNING_PATHS_TABLE, std::slice::from_ref(row))
            .await
    }

    async fn insert_knowledge_nodes(&self, rows: &[KnowledgeNodeRow]) -> Result<(), StorageError> {
        self.append_rows(KNOWLEDGE_NODES_TABLE, rows).await
    }

    async fn insert_prerequisites(&self, rows: &[PrerequisiteRow]) -> Result<(), StorageError> {
        self.append_rows(PREREQUISITES_TABLE, rows).await
    }
}

#[async_trait]
impl JobStatusSink for FsStore {
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: Option<JobProgress>,
        error_message: Option<&str>,
    ) -> Result<(), StorageError> {
        let file = self.job_path(job_id)?;
        ensure_parent(&file).await?;

        let _guard = self.write_lock.lock().await;
        let mut record = self
            .job(job_id)
            .await?
            .unwrap_or_else(|| JobRecord::new(job_id, status));
        record.apply(status, progress, error_message);

        // write-then-rename so readers never see a torn record
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&record)?).await?;
        tokio::fs::rename(&tmp, &file).await?;
        Ok(())
    }
}
