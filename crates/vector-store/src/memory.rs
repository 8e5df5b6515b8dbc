use crate::error::{Result, VectorStoreError};
use crate::index::VectorIndex;
use crate::record::{ChunkRecord, ScoredChunk};
use async_trait::async_trait;
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredEntry {
    record: ChunkRecord,
    vector: Array1<f32>,
}

/// In-memory vector index with brute-force cosine scoring.
///
/// Entries live in a `HashMap` behind an `RwLock`; queries scan every
/// stored vector. Adequate for a single-process corpus and for tests,
/// and the reference semantics for any external backend.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }
    a.dot(b) / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, record: ChunkRecord, vector: Vec<f32>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;

        if let Some(existing) = entries.values().next() {
            if existing.vector.len() != vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: existing.vector.len(),
                    got: vector.len(),
                });
            }
        }

        entries.insert(
            record.id.clone(),
            StoredEntry {
                record,
                vector: Array1::from_vec(vector),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;
        Ok(entries.remove(id).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;
        let before = entries.len();
        entries.retain(|id, _| !id.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Removed {removed} entries with prefix {prefix}");
        }
        Ok(removed)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;

        let query = Array1::from_vec(vector.to_vec());
        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .map(|entry| ScoredChunk {
                record: entry.record.clone(),
                score: cosine(&query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChunkId, ChunkMetadata};
    use pretty_assertions::assert_eq;

    fn record(path: &str, fingerprint: &str, index: usize, content: &str) -> ChunkRecord {
        let id = ChunkId::new(path, fingerprint, index);
        ChunkRecord::new(
            &id,
            content,
            ChunkMetadata {
                filename: path.rsplit('/').next().unwrap_or(path).to_string(),
                path: path.to_string(),
                fingerprint: fingerprint.to_string(),
                chunk_index: index,
                page: index + 1,
                size_bytes: content.len() as u64,
                modified_unix: 0,
            },
        )
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_id() {
        let index = InMemoryIndex::new();
        let rec = record("/a.txt", "f1", 0, "hello");
        index.upsert(rec.clone(), vec![1.0, 0.0]).await.unwrap();
        index.upsert(rec, vec![1.0, 0.0]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(record("/a.txt", "f1", 0, "north"), vec![1.0, 0.0])
            .await
            .unwrap();
        index
            .upsert(record("/a.txt", "f1", 1, "east"), vec![0.0, 1.0])
            .await
            .unwrap();
        index
            .upsert(record("/a.txt", "f1", 2, "northeast"), vec![0.7, 0.7])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.metadata.chunk_index, 0);
        assert_eq!(hits[1].record.metadata.chunk_index, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn delete_prefix_purges_one_version() {
        let index = InMemoryIndex::new();
        for i in 0..3 {
            index
                .upsert(record("/a.txt", "old", i, "x"), vec![1.0, 0.0])
                .await
                .unwrap();
        }
        index
            .upsert(record("/a.txt", "new", 0, "y"), vec![0.0, 1.0])
            .await
            .unwrap();

        let removed = index
            .delete_prefix(&ChunkId::version_prefix("/a.txt", "old"))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_prefix_purges_whole_file() {
        let index = InMemoryIndex::new();
        index
            .upsert(record("/a.txt", "f1", 0, "x"), vec![1.0])
            .await
            .unwrap();
        index
            .upsert(record("/b.txt", "f2", 0, "y"), vec![1.0])
            .await
            .unwrap();

        let removed = index
            .delete_prefix(&ChunkId::file_prefix("/a.txt"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let index = InMemoryIndex::new();
        index
            .upsert(record("/a.txt", "f1", 0, "x"), vec![1.0, 0.0])
            .await
            .unwrap();
        let err = index
            .upsert(record("/b.txt", "f2", 0, "y"), vec![1.0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 2, got: 1 }
        ));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let index = InMemoryIndex::new();
        let rec = record("/a.txt", "f1", 0, "x");
        let id = rec.id.clone();
        index.upsert(rec, vec![1.0]).await.unwrap();
        assert!(index.delete(&id).await.unwrap());
        assert!(!index.delete(&id).await.unwrap());
    }
}
