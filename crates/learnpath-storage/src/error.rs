use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object already exists at {path}")]
    AlreadyExists { path: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the failure means "the target object is already there".
    ///
    /// Hosts wrapping third-party stores often only have a message, so backend
    /// errors mentioning an existing or duplicate object count too.
    pub fn is_conflict(&self) -> bool {
        match self {
            StorageError::AlreadyExists { .. } => true,
            StorageError::Backend(message) => {
                let lower = message.to_lowercase();
                lower.contains("already exists") || lower.contains("duplicate")
            }
            _ => false,
        }
    }
}
