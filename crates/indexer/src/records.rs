use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Last-known index state of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// SHA-256 hex of the file bytes at last successful index.
    pub fingerprint: String,
    pub size_bytes: u64,
    pub modified_unix: u64,
    pub last_indexed_unix_ms: u64,
}

/// File records keyed by path, persisted as JSON so `Unchanged`
/// classification survives restarts.
#[derive(Debug, Default)]
pub struct FileRecordStore {
    records: HashMap<PathBuf, FileRecord>,
}

impl FileRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn upsert(&mut self, record: FileRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileRecord> {
        self.records.remove(path)
    }

    /// Paths of tracked files equal to `root` or beneath it.
    #[must_use]
    pub fn paths_under(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .records
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load records from `path`, starting empty when the file is absent.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let json = tokio::fs::read_to_string(path).await?;
        let records: Vec<FileRecord> = serde_json::from_str(&json)?;
        Ok(Self {
            records: records.into_iter().map(|r| (r.path.clone(), r)).collect(),
        })
    }

    /// Persist all records to `path` as pretty JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let mut records: Vec<&FileRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        let json = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
