use crate::error::{Result, SearchError};
use docdex_vector_store::{Embedder, ScoredChunk, VectorIndex};
use serde::Serialize;
use std::sync::Arc;

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub path: String,
    pub content: String,
    pub page: usize,
    pub similarity: f32,
    pub size_bytes: u64,
    pub modified_unix: u64,
}

impl From<ScoredChunk> for SearchHit {
    fn from(scored: ScoredChunk) -> Self {
        let meta = scored.record.metadata;
        Self {
            filename: meta.filename,
            path: meta.path,
            content: scored.record.content,
            page: meta.page,
            similarity: scored.score.max(0.0),
            size_bytes: meta.size_bytes,
            modified_unix: meta.modified_unix,
        }
    }
}

/// Semantic search over the chunk index.
pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    max_limit: usize,
}

impl SearchEngine {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, max_limit: usize) -> Self {
        Self {
            embedder,
            index,
            max_limit,
        }
    }

    /// Search for chunks similar to `query`, best first.
    ///
    /// `limit` is clamped to the configured maximum; a zero limit yields
    /// no results.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = limit.min(self.max_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        log::debug!("Semantic search: query='{query}', limit={limit}");

        let vector = self.embedder.embed(query).await?;
        let scored = self.index.query(&vector, limit).await?;
        Ok(scored.into_iter().map(SearchHit::from).collect())
    }

    /// Distinct file paths behind the top matches, ranked by best chunk.
    pub async fn search_paths(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let hits = self.search(query, limit).await?;
        let mut paths = Vec::new();
        for hit in hits {
            if !paths.contains(&hit.path) {
                paths.push(hit.path);
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdex_vector_store::{
        ChunkId, ChunkMetadata, ChunkRecord, HashingEmbedder, InMemoryIndex,
    };
    use pretty_assertions::assert_eq;

    async fn seed(index: &InMemoryIndex, embedder: &HashingEmbedder, path: &str, texts: &[&str]) {
        for (i, text) in texts.iter().enumerate() {
            let id = ChunkId::new(path, "fp", i);
            let record = ChunkRecord::new(
                &id,
                *text,
                ChunkMetadata {
                    filename: path.rsplit('/').next().unwrap().to_string(),
                    path: path.to_string(),
                    fingerprint: "fp".to_string(),
                    chunk_index: i,
                    page: i + 1,
                    size_bytes: 100,
                    modified_unix: 1_700_000_000,
                },
            );
            let vector = embedder.embed(text).await.unwrap();
            index.upsert(record, vector).await.unwrap();
        }
    }

    fn engine(max_limit: usize) -> (SearchEngine, Arc<InMemoryIndex>, Arc<HashingEmbedder>) {
        let embedder = Arc::new(HashingEmbedder::default());
        let index = Arc::new(InMemoryIndex::new());
        let engine = SearchEngine::new(embedder.clone(), index.clone(), max_limit);
        (engine, index, embedder)
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (engine, _, _) = engine(10);
        assert!(matches!(
            engine.search("  ", 5).await,
            Err(SearchError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn results_are_ranked_by_similarity() {
        let (engine, index, embedder) = engine(10);
        seed(
            &index,
            &embedder,
            "/docs/manual.txt",
            &[
                "installation guide for the printer driver",
                "troubleshooting paper jams and toner",
                "warranty and support contact details",
            ],
        )
        .await;

        let hits = engine.search("toner troubleshooting", 10).await.unwrap();
        assert_eq!(hits[0].page, 2);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert_eq!(hits[0].filename, "manual.txt");
    }

    #[tokio::test]
    async fn limit_is_clamped_to_maximum() {
        let (engine, index, embedder) = engine(2);
        seed(
            &index,
            &embedder,
            "/docs/a.txt",
            &["alpha one", "alpha two", "alpha three", "alpha four"],
        )
        .await;

        let hits = engine.search("alpha", 100).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn search_paths_deduplicates() {
        let (engine, index, embedder) = engine(10);
        seed(&index, &embedder, "/docs/a.txt", &["wombat one", "wombat two"]).await;
        seed(&index, &embedder, "/docs/b.txt", &["wombat three"]).await;

        let paths = engine.search_paths("wombat", 10).await.unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn zero_limit_yields_no_results() {
        let (engine, index, embedder) = engine(10);
        seed(&index, &embedder, "/docs/a.txt", &["something here"]).await;
        let hits = engine.search("something", 0).await.unwrap();
        assert!(hits.is_empty());
    }
}
