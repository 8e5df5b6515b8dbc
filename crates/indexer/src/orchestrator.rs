use crate::change::{ChangeDetector, FileChange};
use crate::config::DocdexConfig;
use crate::error::{FileFailure, IndexerError, Result};
use crate::parse::{DocumentFormat, ParseError, Parser};
use crate::progress::{IndexingStatus, LogLevel, ProgressTracker};
use crate::records::{FileRecord, FileRecordStore};
use crate::selection::{PathSelection, SelectionRequest};
use crate::writer::{FileMeta, IndexWriter, WriteError};
use docdex_search::{SearchEngine, SearchHit};
use docdex_text_chunker::Chunker;
use docdex_vector_store::{Embedder, VectorIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

const WATCHED_PATHS_FILE: &str = "watched_paths.json";
const FILE_RECORDS_FILE: &str = "file_records.json";

/// Corpus-level totals exposed next to the status feed.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub watched_path_count: usize,
}

#[derive(Debug)]
enum OperationKind {
    SelectionChange(Vec<SelectionRequest>),
    Rescan,
}

#[derive(Debug)]
struct Operation {
    id: u64,
    kind: OperationKind,
}

enum Command {
    Run(Operation),
    Shutdown,
}

/// Handle to the indexing service.
///
/// Cloning shares the underlying loop; the loop shuts down when the last
/// handle is dropped or [`shutdown`](IndexService::shutdown) is called.
/// Selection changes are validated synchronously, then queued as
/// operations behind whatever is currently running, never preempting it.
#[derive(Clone)]
pub struct IndexService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    command_tx: mpsc::Sender<Command>,
    status_tx: watch::Sender<IndexingStatus>,
    // Keep one receiver alive so the watch channel retains the latest
    // published status even when no external subscriber is listening;
    // otherwise `status_tx.send` is a no-op and `status()` reads stale.
    _status_guard: watch::Receiver<IndexingStatus>,
    selection: Arc<RwLock<PathSelection>>,
    index: Arc<dyn VectorIndex>,
    parser: Arc<dyn Parser>,
    search: SearchEngine,
    config: DocdexConfig,
    next_operation_id: Arc<AtomicU64>,
}

impl IndexService {
    /// Start the service: restore persisted state, spawn the operation
    /// loop, and schedule an initial rescan when a selection was restored.
    pub async fn start(
        config: DocdexConfig,
        parser: Arc<dyn Parser>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.state_dir).await?;

        let selection_path = config.state_dir.join(WATCHED_PATHS_FILE);
        let mut selection = load_selection(&selection_path).await?;
        let missing: Vec<PathBuf> = selection
            .list()
            .into_iter()
            .filter(|path| !path.exists())
            .collect();
        if !missing.is_empty() {
            for path in &missing {
                log::warn!("Dropping missing watched path {}", path.display());
                selection.remove(path);
            }
            save_selection(&selection_path, &selection).await?;
        }
        let restored = !selection.is_empty();
        if restored {
            log::info!("Restored {} watched paths", selection.len());
        }

        let records = FileRecordStore::load(&config.state_dir.join(FILE_RECORDS_FILE)).await?;

        let (command_tx, command_rx) = mpsc::channel(64);
        let (status_tx, status_guard) = watch::channel(IndexingStatus::initial());
        let selection = Arc::new(RwLock::new(selection));
        let next_operation_id = Arc::new(AtomicU64::new(1));

        let chunker = Chunker::new(config.chunking)?;
        let op_loop = OperationLoop {
            config: config.clone(),
            selection: selection.clone(),
            records,
            records_path: config.state_dir.join(FILE_RECORDS_FILE),
            selection_path,
            parser: parser.clone(),
            detector: ChangeDetector::new(parser.clone(), config.indexing.max_concurrent_hashes),
            writer: IndexWriter::new(index.clone(), embedder.clone(), chunker),
            tracker: ProgressTracker::new(config.indexing.log_capacity, status_tx.clone()),
            command_rx,
            next_operation_id: next_operation_id.clone(),
        };
        tokio::spawn(op_loop.run());

        let service = Self {
            inner: Arc::new(ServiceInner {
                command_tx,
                status_tx,
                _status_guard: status_guard,
                selection,
                index: index.clone(),
                parser,
                search: SearchEngine::new(embedder, index, config.search.max_limit),
                config,
                next_operation_id,
            }),
        };

        if restored {
            // Pick up whatever changed while the process was down.
            service.rescan().await?;
        }

        Ok(service)
    }

    /// Apply a batch of selection toggles. Rejected synchronously with
    /// `InvalidSelection` before any operation is created; on success the
    /// queued operation id is returned.
    pub async fn apply_selection(&self, requests: Vec<SelectionRequest>) -> Result<u64> {
        self.validate_requests(&requests)?;
        self.enqueue(OperationKind::SelectionChange(requests)).await
    }

    /// Queue a rescan of every watched root.
    pub async fn rescan(&self) -> Result<u64> {
        self.enqueue(OperationKind::Rescan).await
    }

    /// Lock-free snapshot of the current indexing status.
    #[must_use]
    pub fn status(&self) -> IndexingStatus {
        self.inner.status_tx.subscribe().borrow().clone()
    }

    /// Stream of status snapshots for observers that prefer awaiting over
    /// polling.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<IndexingStatus> {
        self.inner.status_tx.subscribe()
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_chunks: self.inner.index.count().await?,
            watched_path_count: self.watched_paths().len(),
        })
    }

    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner
            .selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }

    /// Semantic search over the indexed corpus. `limit` defaults to the
    /// configured default and is clamped to the configured maximum.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.inner.config.search.default_limit);
        Ok(self.inner.search.search(query, limit).await?)
    }

    /// Distinct file paths behind the top matches.
    pub async fn search_paths(&self, query: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let limit = limit.unwrap_or(self.inner.config.search.default_limit);
        Ok(self.inner.search.search_paths(query, limit).await?)
    }

    /// Stop the operation loop. Queued operations are dropped; the
    /// running one finishes first.
    pub async fn shutdown(&self) {
        let _ = self.inner.command_tx.send(Command::Shutdown).await;
    }

    async fn enqueue(&self, kind: OperationKind) -> Result<u64> {
        let id = self.inner.next_operation_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .command_tx
            .send(Command::Run(Operation { id, kind }))
            .await
            .map_err(|e| IndexerError::Other(format!("indexing loop unavailable: {e}")))?;
        Ok(id)
    }

    fn validate_requests(&self, requests: &[SelectionRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(IndexerError::InvalidSelection(
                "selection batch is empty".to_string(),
            ));
        }

        let mut seen: HashMap<&Path, bool> = HashMap::new();
        for request in requests {
            if !request.path.is_absolute() {
                return Err(IndexerError::InvalidSelection(format!(
                    "path is not absolute: {}",
                    request.path.display()
                )));
            }
            if let Some(previous) = seen.insert(&request.path, request.included) {
                if previous != request.included {
                    return Err(IndexerError::InvalidSelection(format!(
                        "conflicting entries for {}",
                        request.path.display()
                    )));
                }
            }
            if request.included {
                if !request.path.exists() {
                    return Err(IndexerError::InvalidSelection(format!(
                        "path does not exist: {}",
                        request.path.display()
                    )));
                }
                if request.path.is_file() {
                    let supported = DocumentFormat::from_path(&request.path)
                        .is_some_and(|format| self.inner.parser.supports(format));
                    if !supported {
                        return Err(IndexerError::InvalidSelection(format!(
                            "unsupported file type: {}",
                            request.path.display()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for IndexService {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(Command::Shutdown);
        }
    }
}

struct PendingFile {
    path: PathBuf,
    filename: String,
    fingerprint: String,
    old_fingerprint: Option<String>,
    size_bytes: u64,
    modified_unix: u64,
}

struct OperationLoop {
    config: DocdexConfig,
    selection: Arc<RwLock<PathSelection>>,
    records: FileRecordStore,
    records_path: PathBuf,
    selection_path: PathBuf,
    parser: Arc<dyn Parser>,
    detector: ChangeDetector,
    writer: IndexWriter,
    tracker: ProgressTracker,
    command_rx: mpsc::Receiver<Command>,
    next_operation_id: Arc<AtomicU64>,
}

impl OperationLoop {
    async fn run(mut self) {
        let period = self.config.indexing.rescan_interval();
        let mut rescan = time::interval_at(time::Instant::now() + period, period);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_cmd = self.command_rx.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    if !self.handle(cmd).await {
                        break;
                    }
                    // Run whatever queued up behind us, then report idle.
                    let mut shutdown = false;
                    while let Ok(next) = self.command_rx.try_recv() {
                        if !self.handle(next).await {
                            shutdown = true;
                            break;
                        }
                    }
                    self.tracker.idle();
                    if shutdown {
                        break;
                    }
                }
                _ = rescan.tick() => {
                    let roots = self.watched_roots();
                    if !roots.is_empty() {
                        let id = self.next_operation_id.fetch_add(1, Ordering::SeqCst);
                        self.run_operation(Operation {
                            id,
                            kind: OperationKind::Rescan,
                        })
                        .await;
                        self.tracker.idle();
                    }
                }
            }
        }

        log::debug!("Indexing loop stopped");
    }

    /// Returns false on shutdown.
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Run(op) => {
                self.run_operation(op).await;
                true
            }
            Command::Shutdown => false,
        }
    }

    async fn run_operation(&mut self, op: Operation) {
        log::info!("Running operation {}", op.id);
        let result = match op.kind {
            OperationKind::SelectionChange(requests) => {
                self.run_selection_change(op.id, &requests).await
            }
            OperationKind::Rescan => {
                let roots = self.watched_roots();
                self.run_index_pass(op.id, &roots, &[]).await
            }
        };

        if let Err(err) = result {
            log::error!("Operation {} failed: {err}", op.id);
            self.tracker.operation_failed(op.id, &err.to_string());
        }

        if let Err(err) = self.records.save(&self.records_path).await {
            log::warn!("Failed to persist file records: {err}");
        }
    }

    async fn run_selection_change(&mut self, id: u64, requests: &[SelectionRequest]) -> Result<()> {
        let diff = {
            let mut selection = self
                .selection
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            selection.apply(requests)
        };
        {
            let selection = self
                .selection
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            save_selection(&self.selection_path, &selection).await?;
        }

        log::info!(
            "Selection changed: {} roots added, {} removed",
            diff.added.len(),
            diff.removed.len()
        );
        self.run_index_pass(id, &diff.added, &diff.removed).await
    }

    /// One operation: purge removed roots, scan the targets, then index
    /// every New or Modified file. Per-file failures are recorded and
    /// skipped; only a store outage aborts.
    async fn run_index_pass(
        &mut self,
        id: u64,
        roots: &[PathBuf],
        removed_roots: &[PathBuf],
    ) -> Result<()> {
        let changes = if roots.is_empty() {
            Vec::new()
        } else {
            self.detector.scan(roots, &self.records).await
        };

        let mut work: Vec<PendingFile> = Vec::new();
        let mut scan_failures: Vec<(PathBuf, String)> = Vec::new();
        let mut deleted: Vec<PathBuf> = Vec::new();
        let mut unchanged = 0usize;

        for change in changes {
            match change {
                FileChange::New {
                    path,
                    fingerprint,
                    size_bytes,
                    modified_unix,
                } => work.push(PendingFile {
                    filename: display_name(&path),
                    old_fingerprint: None,
                    path,
                    fingerprint,
                    size_bytes,
                    modified_unix,
                }),
                FileChange::Modified {
                    path,
                    fingerprint,
                    size_bytes,
                    modified_unix,
                } => {
                    let old_fingerprint =
                        self.records.get(&path).map(|r| r.fingerprint.clone());
                    work.push(PendingFile {
                        filename: display_name(&path),
                        old_fingerprint,
                        path,
                        fingerprint,
                        size_bytes,
                        modified_unix,
                    });
                }
                FileChange::Unchanged { path } => {
                    log::debug!("Skipped (already indexed): {}", path.display());
                    unchanged += 1;
                }
                FileChange::Deleted { path } => deleted.push(path),
                FileChange::Failed { path, reason } => scan_failures.push((path, reason)),
            }
        }

        let total_files = work.len() + scan_failures.len();
        let total_bytes = work.iter().map(|f| f.size_bytes).sum();
        self.tracker.operation_started(id, total_files, total_bytes);

        self.purge_removed_roots(removed_roots).await?;

        for path in deleted {
            let removed = self
                .writer
                .purge(&path)
                .await
                .map_err(write_error_fatal)?;
            self.records.remove(&path);
            self.tracker.file_removed(&display_name(&path), removed);
        }

        if unchanged > 0 {
            self.tracker
                .note(LogLevel::Info, format!("Skipped {unchanged} unchanged files"));
        }

        for (path, reason) in scan_failures {
            self.tracker
                .file_failed(&display_name(&path), 0, &FileFailure::Unreadable(reason).to_string());
        }

        let timeout = self.config.indexing.per_file_timeout();
        for file in work {
            self.tracker.file_started(&file.filename);

            let outcome = time::timeout(timeout, self.index_one(&file)).await;
            match outcome {
                Err(_) => {
                    let failure = FileFailure::Timeout(self.config.indexing.per_file_timeout_secs);
                    self.tracker
                        .file_failed(&file.filename, file.size_bytes, &failure.to_string());
                }
                Ok(Ok(chunks)) => {
                    self.records.upsert(FileRecord {
                        path: file.path.clone(),
                        fingerprint: file.fingerprint.clone(),
                        size_bytes: file.size_bytes,
                        modified_unix: file.modified_unix,
                        last_indexed_unix_ms: current_unix_ms(),
                    });
                    self.tracker
                        .file_completed(&file.filename, file.size_bytes, chunks);
                }
                Ok(Err(WriteError::File(failure))) => {
                    self.tracker
                        .file_failed(&file.filename, file.size_bytes, &failure.to_string());
                }
                Ok(Err(WriteError::Store(message))) => {
                    return Err(IndexerError::Other(format!(
                        "vector store unavailable: {message}"
                    )));
                }
            }
        }

        self.tracker.operation_completed(id);
        Ok(())
    }

    /// Index one file end to end. Self-contained so files never interleave
    /// writes; the file record is committed by the caller only on success.
    async fn index_one(&mut self, file: &PendingFile) -> std::result::Result<usize, WriteError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| WriteError::File(FileFailure::Unreadable(e.to_string())))?;

        let format = DocumentFormat::from_path(&file.path).ok_or_else(|| {
            WriteError::File(FileFailure::UnsupportedFormat(
                file.path.to_string_lossy().to_string(),
            ))
        })?;

        let parsed = self.parser.parse(&bytes, format).map_err(|e| {
            WriteError::File(match e {
                ParseError::UnsupportedFormat(f) => FileFailure::UnsupportedFormat(f),
                ParseError::CorruptDocument(m) => FileFailure::CorruptDocument(m),
            })
        })?;

        if parsed.text.is_empty() {
            log::warn!("No content extracted from {}", file.path.display());
            return Ok(0);
        }

        let meta = FileMeta::new(
            &file.path,
            file.fingerprint.clone(),
            file.size_bytes,
            file.modified_unix,
        );
        let tracker = &mut self.tracker;
        self.writer
            .reindex(
                &meta,
                file.old_fingerprint.as_deref(),
                &parsed.text,
                &mut |processed, total| {
                    if processed == 0 {
                        tracker.file_chunk_total(total);
                    } else {
                        tracker.chunk_processed();
                    }
                },
            )
            .await
    }

    /// Purge files that stopped being covered by the selection. A file
    /// that is still covered by a surviving root (say its folder was
    /// removed but a watched subfolder remains) is left alone.
    async fn purge_removed_roots(&mut self, removed_roots: &[PathBuf]) -> Result<()> {
        if removed_roots.is_empty() {
            return Ok(());
        }

        let selection = self
            .selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for root in removed_roots {
            for path in self.records.paths_under(root) {
                if selection.covers(&path) {
                    continue;
                }
                let removed = self
                    .writer
                    .purge(&path)
                    .await
                    .map_err(write_error_fatal)?;
                self.records.remove(&path);
                self.tracker.file_removed(&display_name(&path), removed);
            }
        }
        Ok(())
    }

    fn watched_roots(&self) -> Vec<PathBuf> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }
}

fn write_error_fatal(err: WriteError) -> IndexerError {
    IndexerError::Other(err.to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

async fn load_selection(path: &Path) -> Result<PathSelection> {
    if !path.exists() {
        return Ok(PathSelection::new());
    }
    let json = tokio::fs::read_to_string(path).await?;
    let entries: Vec<PathBuf> = serde_json::from_str(&json)?;
    Ok(PathSelection::from_entries(entries))
}

async fn save_selection(path: &Path, selection: &PathSelection) -> Result<()> {
    let json = serde_json::to_string_pretty(&selection.list())?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
