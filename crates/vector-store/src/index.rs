use crate::error::Result;
use crate::record::{ChunkRecord, ScoredChunk};
use async_trait::async_trait;

/// Vector database capability consumed by the pipeline.
///
/// Keys are encoded [`ChunkId`]s, so `delete_prefix` with
/// [`ChunkId::file_prefix`] purges a file and with
/// [`ChunkId::version_prefix`] purges one stale version. Backends signal
/// outage with [`VectorStoreError::StoreUnavailable`], which the
/// orchestrator treats as operation-fatal.
///
/// [`ChunkId`]: crate::ChunkId
/// [`ChunkId::file_prefix`]: crate::ChunkId::file_prefix
/// [`ChunkId::version_prefix`]: crate::ChunkId::version_prefix
/// [`VectorStoreError::StoreUnavailable`]: crate::VectorStoreError::StoreUnavailable
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry with `record.id`.
    async fn upsert(&self, record: ChunkRecord, vector: Vec<f32>) -> Result<()>;

    /// Delete one entry. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every entry whose id starts with `prefix`. Returns the count.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    /// The `k` stored chunks closest to `vector`, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize>;
}
