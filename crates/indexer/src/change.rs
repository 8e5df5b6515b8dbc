use crate::parse::{DocumentFormat, Parser};
use crate::records::FileRecordStore;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Classification of one file against its stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    New {
        path: PathBuf,
        fingerprint: String,
        size_bytes: u64,
        modified_unix: u64,
    },
    Modified {
        path: PathBuf,
        fingerprint: String,
        size_bytes: u64,
        modified_unix: u64,
    },
    Unchanged {
        path: PathBuf,
    },
    Deleted {
        path: PathBuf,
    },
    Failed {
        path: PathBuf,
        reason: String,
    },
}

impl FileChange {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::New { path, .. }
            | Self::Modified { path, .. }
            | Self::Unchanged { path }
            | Self::Deleted { path }
            | Self::Failed { path, .. } => path,
        }
    }
}

/// Walks watched roots, fingerprints file contents, and classifies each
/// file against the record store.
///
/// One pass per invocation; a new scan re-walks from the roots. A file
/// that cannot be read yields `Failed` and never aborts the scan.
pub struct ChangeDetector {
    parser: Arc<dyn Parser>,
    max_concurrent: usize,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(parser: Arc<dyn Parser>, max_concurrent: usize) -> Self {
        Self {
            parser,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Scan `roots` and classify every supported file plus every tracked
    /// file that disappeared from beneath them.
    pub async fn scan(&self, roots: &[PathBuf], records: &FileRecordStore) -> Vec<FileChange> {
        let candidates = self.enumerate(roots);
        log::debug!("Scan found {} candidate files", candidates.len());

        let mut changes = Vec::with_capacity(candidates.len());
        let candidate_list: Vec<PathBuf> = candidates.iter().cloned().collect();

        for batch in candidate_list.chunks(self.max_concurrent) {
            let mut tasks = Vec::with_capacity(batch.len());
            for path in batch {
                let path = path.clone();
                tasks.push(tokio::spawn(async move { fingerprint_file(path).await }));
            }

            for task in tasks {
                match task.await {
                    Ok((path, Ok(stat))) => changes.push(classify(path, stat, records)),
                    Ok((path, Err(reason))) => changes.push(FileChange::Failed { path, reason }),
                    Err(e) => log::warn!("Fingerprint task panicked: {e}"),
                }
            }
        }

        // Tracked files that vanished from the scanned roots.
        for root in roots {
            for path in records.paths_under(root) {
                if !candidates.contains(&path) && !path.exists() {
                    changes.push(FileChange::Deleted { path });
                }
            }
        }

        changes
    }

    /// All supported files under the roots, deduplicated and ordered.
    /// Hidden files and directories are skipped, matching the original
    /// browser behavior.
    fn enumerate(&self, roots: &[PathBuf]) -> BTreeSet<PathBuf> {
        let mut candidates = BTreeSet::new();

        for root in roots {
            if root.is_file() {
                if self.is_supported(root) {
                    candidates.insert(root.clone());
                }
                continue;
            }

            // Depth 0 is the watched root itself; a user may well select a
            // dot-directory explicitly.
            let walker = WalkDir::new(root)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Walk error under {}: {e}", root.display());
                        continue;
                    }
                };
                if entry.file_type().is_file() && self.is_supported(entry.path()) {
                    candidates.insert(entry.path().to_path_buf());
                }
            }
        }

        candidates
    }

    fn is_supported(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some_and(|format| self.parser.supports(format))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

struct FileStat {
    fingerprint: String,
    size_bytes: u64,
    modified_unix: u64,
}

async fn fingerprint_file(path: PathBuf) -> (PathBuf, std::result::Result<FileStat, String>) {
    let result = async {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))?;
        let modified_unix = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(FileStat {
            fingerprint: format!("{:x}", hasher.finalize()),
            size_bytes: metadata.len(),
            modified_unix,
        })
    }
    .await;
    (path, result)
}

fn classify(path: PathBuf, stat: FileStat, records: &FileRecordStore) -> FileChange {
    match records.get(&path) {
        None => FileChange::New {
            path,
            fingerprint: stat.fingerprint,
            size_bytes: stat.size_bytes,
            modified_unix: stat.modified_unix,
        },
        Some(record) if record.fingerprint == stat.fingerprint => FileChange::Unchanged { path },
        Some(_) => FileChange::Modified {
            path,
            fingerprint: stat.fingerprint,
            size_bytes: stat.size_bytes,
            modified_unix: stat.modified_unix,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::PlainTextParser;
    use crate::records::FileRecord;
    use pretty_assertions::assert_eq;

    fn detector() -> ChangeDetector {
        ChangeDetector::new(Arc::new(PlainTextParser::new()), 4)
    }

    fn kind(change: &FileChange) -> &'static str {
        match change {
            FileChange::New { .. } => "new",
            FileChange::Modified { .. } => "modified",
            FileChange::Unchanged { .. } => "unchanged",
            FileChange::Deleted { .. } => "deleted",
            FileChange::Failed { .. } => "failed",
        }
    }

    #[tokio::test]
    async fn untracked_files_are_new() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("skip.bin"), "binary").unwrap();

        let changes = detector()
            .scan(&[dir.path().to_path_buf()], &FileRecordStore::new())
            .await;
        assert_eq!(changes.len(), 1);
        assert_eq!(kind(&changes[0]), "new");
    }

    #[tokio::test]
    async fn identical_bytes_classify_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "stable content").unwrap();

        let detector = detector();
        let mut records = FileRecordStore::new();
        let first = detector.scan(&[dir.path().to_path_buf()], &records).await;
        let FileChange::New {
            path,
            fingerprint,
            size_bytes,
            modified_unix,
        } = first[0].clone()
        else {
            panic!("expected New");
        };
        records.upsert(FileRecord {
            path,
            fingerprint,
            size_bytes,
            modified_unix,
            last_indexed_unix_ms: 0,
        });

        let second = detector.scan(&[dir.path().to_path_buf()], &records).await;
        assert_eq!(kind(&second[0]), "unchanged");
    }

    #[tokio::test]
    async fn changed_bytes_classify_modified() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "version one").unwrap();

        let mut records = FileRecordStore::new();
        records.upsert(FileRecord {
            path: file.clone(),
            fingerprint: "not-the-real-hash".to_string(),
            size_bytes: 1,
            modified_unix: 0,
            last_indexed_unix_ms: 0,
        });

        let changes = detector().scan(&[dir.path().to_path_buf()], &records).await;
        assert_eq!(kind(&changes[0]), "modified");
    }

    #[tokio::test]
    async fn missing_tracked_file_classifies_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.txt");

        let mut records = FileRecordStore::new();
        records.upsert(FileRecord {
            path: gone.clone(),
            fingerprint: "f1".to_string(),
            size_bytes: 1,
            modified_unix: 0,
            last_indexed_unix_ms: 0,
        });

        let changes = detector().scan(&[dir.path().to_path_buf()], &records).await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0], FileChange::Deleted { path: gone });
    }

    #[tokio::test]
    async fn hidden_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join(".cache/a.txt"), "hidden").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "hidden").unwrap();
        std::fs::write(dir.path().join("visible.txt"), "seen").unwrap();

        let changes = detector()
            .scan(&[dir.path().to_path_buf()], &FileRecordStore::new())
            .await;
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].path(),
            dir.path().join("visible.txt").as_path()
        );
    }

    #[tokio::test]
    async fn single_file_root_is_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.md");
        std::fs::write(&file, "# heading").unwrap();

        let changes = detector().scan(&[file.clone()], &FileRecordStore::new()).await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path(), file.as_path());
    }
}
