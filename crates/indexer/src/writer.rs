use crate::error::FileFailure;
use docdex_text_chunker::Chunker;
use docdex_vector_store::{
    ChunkId, ChunkMetadata, ChunkRecord, Embedder, VectorIndex, VectorStoreError,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// File-level facts recorded with every chunk.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: String,
    pub filename: String,
    pub fingerprint: String,
    pub size_bytes: u64,
    pub modified_unix: u64,
}

impl FileMeta {
    #[must_use]
    pub fn new(path: &Path, fingerprint: String, size_bytes: u64, modified_unix: u64) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            filename: path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().to_string()),
            fingerprint,
            size_bytes,
            modified_unix,
        }
    }
}

/// How a reindex attempt went wrong.
///
/// `File` failures are recorded and skipped; `Store` failures abort the
/// running operation.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    File(FileFailure),

    #[error("Vector store unavailable: {0}")]
    Store(String),
}

fn store_or_embedding(err: VectorStoreError) -> WriteError {
    match err {
        VectorStoreError::ModelUnavailable(msg) => WriteError::File(FileFailure::Embedding(msg)),
        other => WriteError::Store(other.to_string()),
    }
}

/// Writes one file's chunks into the vector index.
///
/// Stale entries of a previous fingerprint are deleted before the new
/// version is written, so no dangling chunks survive a content change.
/// The caller commits the FileRecord only after `reindex` returns Ok, so
/// a mid-file failure leaves the file retryable wholesale.
pub struct IndexWriter {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl IndexWriter {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            index,
            embedder,
            chunker,
        }
    }

    /// Re-index one file from its parsed text. Returns the number of
    /// chunks written. `on_chunk(processed, total)` fires once when the
    /// chunk count is known and again after every embedded chunk.
    pub async fn reindex(
        &self,
        meta: &FileMeta,
        old_fingerprint: Option<&str>,
        text: &str,
        on_chunk: &mut (dyn FnMut(usize, usize) + Send),
    ) -> std::result::Result<usize, WriteError> {
        if let Some(old) = old_fingerprint {
            if old != meta.fingerprint {
                let removed = self
                    .index
                    .delete_prefix(&ChunkId::version_prefix(&meta.path, old))
                    .await
                    .map_err(|e| WriteError::Store(e.to_string()))?;
                log::debug!("Dropped {removed} stale chunks for {}", meta.path);
            }
        }

        let chunks = self.chunker.chunk(text);
        let total = chunks.len();
        on_chunk(0, total);

        for chunk in chunks {
            let id = ChunkId::new(&meta.path, &meta.fingerprint, chunk.index);
            let record = ChunkRecord::new(
                &id,
                chunk.content,
                ChunkMetadata {
                    filename: meta.filename.clone(),
                    path: meta.path.clone(),
                    fingerprint: meta.fingerprint.clone(),
                    chunk_index: chunk.index,
                    page: chunk.index + 1,
                    size_bytes: meta.size_bytes,
                    modified_unix: meta.modified_unix,
                },
            );

            let vector = self
                .embedder
                .embed(&record.content)
                .await
                .map_err(store_or_embedding)?;
            self.index
                .upsert(record, vector)
                .await
                .map_err(|e| WriteError::Store(e.to_string()))?;

            on_chunk(chunk.index + 1, total);
        }

        Ok(total)
    }

    /// Delete every index entry for `path`, across all versions. Returns
    /// the number of chunks removed.
    pub async fn purge(&self, path: &Path) -> std::result::Result<usize, WriteError> {
        let path = path.to_string_lossy();
        self.index
            .delete_prefix(&ChunkId::file_prefix(&path))
            .await
            .map_err(|e| WriteError::Store(e.to_string()))
    }
}
