use crate::error::{IndexerError, Result};
use docdex_text_chunker::ChunkerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the indexing service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocdexConfig {
    /// Directory holding persisted selection and file records.
    pub state_dir: PathBuf,
    pub chunking: ChunkerConfig,
    pub search: SearchConfig,
    pub indexing: IndexingConfig,
}

impl Default for DocdexConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".docdex"),
            chunking: ChunkerConfig::default(),
            search: SearchConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Fingerprint computations running at once during a scan.
    pub max_concurrent_hashes: usize,
    /// Deadline for reading, parsing, and embedding one file; a hang
    /// becomes a recorded per-file failure.
    pub per_file_timeout_secs: u64,
    /// Interval between periodic rescans of the watched roots.
    pub rescan_interval_secs: u64,
    /// Capacity of the status log ring.
    pub log_capacity: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_hashes: 16,
            per_file_timeout_secs: 120,
            rescan_interval_secs: 300,
            log_capacity: 50,
        }
    }
}

impl IndexingConfig {
    #[must_use]
    pub const fn per_file_timeout(&self) -> Duration {
        Duration::from_secs(self.per_file_timeout_secs)
    }

    #[must_use]
    pub const fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }
}

impl DocdexConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking
            .validate()
            .map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;
        if self.search.max_limit == 0 {
            return Err(IndexerError::InvalidConfig(
                "search.max_limit must be > 0".to_string(),
            ));
        }
        if self.search.default_limit > self.search.max_limit {
            return Err(IndexerError::InvalidConfig(format!(
                "search.default_limit ({}) must not exceed search.max_limit ({})",
                self.search.default_limit, self.search.max_limit
            )));
        }
        if self.indexing.max_concurrent_hashes == 0 {
            return Err(IndexerError::InvalidConfig(
                "indexing.max_concurrent_hashes must be > 0".to_string(),
            ));
        }
        if self.indexing.per_file_timeout_secs == 0 {
            return Err(IndexerError::InvalidConfig(
                "indexing.per_file_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.indexing.log_capacity == 0 {
            return Err(IndexerError::InvalidConfig(
                "indexing.log_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<DocdexConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: DocdexConfig =
        toml::from_str(&content).map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
