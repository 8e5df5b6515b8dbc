use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] docdex_text_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] docdex_vector_store::VectorStoreError),

    #[error("Search error: {0}")]
    SearchError(#[from] docdex_search::SearchError),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Why one file could not be indexed.
///
/// Caught at the file boundary: the file is logged, skipped, and retried
/// on the next scan that sees its fingerprint differ. Never aborts the
/// running operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileFailure {
    #[error("Unreadable file: {0}")]
    Unreadable(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Embedding failure: {0}")]
    Embedding(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}
