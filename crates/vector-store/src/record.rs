use serde::{Deserialize, Serialize};

/// Identity of one stored chunk: `(path, fingerprint, chunk index)`.
///
/// Re-processing an unchanged file reproduces the same identities, so
/// upserts are idempotent and never duplicate vectors. The string encoding
/// keeps the components ordered so a prefix match selects either every
/// version of a file or exactly one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub path: String,
    pub fingerprint: String,
    pub index: usize,
}

impl ChunkId {
    #[must_use]
    pub fn new(path: impl Into<String>, fingerprint: impl Into<String>, index: usize) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            index,
        }
    }

    /// Encoded form used as the store key.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}#{}#{}", self.path, self.fingerprint, self.index)
    }

    /// Prefix matching every chunk of `path`, across all versions.
    #[must_use]
    pub fn file_prefix(path: &str) -> String {
        format!("{path}#")
    }

    /// Prefix matching every chunk of one `(path, fingerprint)` version.
    #[must_use]
    pub fn version_prefix(path: &str, fingerprint: &str) -> String {
        format!("{path}#{fingerprint}#")
    }
}

/// File-level metadata carried alongside each stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub path: String,
    pub fingerprint: String,
    pub chunk_index: usize,
    pub page: usize,
    pub size_bytes: u64,
    pub modified_unix: u64,
}

/// A chunk as handed to the vector index for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    #[must_use]
    pub fn new(id: &ChunkId, content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.encode(),
            content: content.into(),
            metadata,
        }
    }
}

/// A stored chunk with its query similarity, higher is closer.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}
