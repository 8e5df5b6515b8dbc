use serde::Serialize;
use std::collections::VecDeque;
use std::time::SystemTime;
use tokio::sync::watch;

/// Tracker state machine: `Idle → Running → (Completed | Failed) → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Severity of one status log line, mirroring the activity feed levels of
/// the original system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Processing,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp_unix_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

/// Chunk progress of the file currently being indexed. `total` stays 0
/// while the file is still parsing, so observers can distinguish the
/// parsing and chunking sub-phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkProgress {
    pub processed: usize,
    pub total: usize,
}

/// Snapshot of indexing progress, published through a watch channel so
/// readers poll without blocking the writer.
#[derive(Debug, Clone, Serialize)]
pub struct IndexingStatus {
    pub state: TrackerState,
    pub is_running: bool,
    pub operation_id: Option<u64>,
    /// Aggregate percentage for the running operation, clamped to 100.
    pub progress: f32,
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub completed_chunks: usize,
    pub current_file: Option<String>,
    pub current_file_chunks: ChunkProgress,
    /// Operations finished since the service started.
    pub completed_operations: u64,
    pub last_error: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl IndexingStatus {
    #[must_use]
    pub fn initial() -> Self {
        Self {
            state: TrackerState::Idle,
            is_running: false,
            operation_id: None,
            progress: 0.0,
            total_files: 0,
            completed_files: 0,
            failed_files: 0,
            total_bytes: 0,
            processed_bytes: 0,
            completed_chunks: 0,
            current_file: None,
            current_file_chunks: ChunkProgress::default(),
            completed_operations: 0,
            last_error: None,
            logs: Vec::new(),
        }
    }
}

/// Single-writer progress state.
///
/// Owned by the orchestrator loop; every mutation republishes the
/// snapshot. Counters only ever increase while an operation runs, so
/// successive reads observe monotone progress.
pub struct ProgressTracker {
    status: IndexingStatus,
    logs: VecDeque<LogEntry>,
    log_capacity: usize,
    tx: watch::Sender<IndexingStatus>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(log_capacity: usize, tx: watch::Sender<IndexingStatus>) -> Self {
        Self {
            status: IndexingStatus::initial(),
            logs: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            tx,
        }
    }

    pub fn operation_started(&mut self, id: u64, total_files: usize, total_bytes: u64) {
        self.status.state = TrackerState::Running;
        self.status.is_running = true;
        self.status.operation_id = Some(id);
        self.status.progress = 0.0;
        self.status.total_files = total_files;
        self.status.completed_files = 0;
        self.status.failed_files = 0;
        self.status.total_bytes = total_bytes;
        self.status.processed_bytes = 0;
        self.status.completed_chunks = 0;
        self.status.current_file = None;
        self.status.current_file_chunks = ChunkProgress::default();
        self.status.last_error = None;
        self.log(
            LogLevel::Info,
            format!("Started operation {id}: {total_files} files, {total_bytes} bytes"),
        );
        self.publish();
    }

    pub fn file_started(&mut self, name: &str) {
        self.status.current_file = Some(name.to_string());
        self.status.current_file_chunks = ChunkProgress::default();
        self.log(LogLevel::Processing, format!("Indexing {name}"));
        self.publish();
    }

    /// Chunk count became known for the current file; the parsing
    /// sub-phase is over.
    pub fn file_chunk_total(&mut self, total: usize) {
        self.status.current_file_chunks = ChunkProgress {
            processed: 0,
            total,
        };
        self.publish();
    }

    pub fn chunk_processed(&mut self) {
        self.status.current_file_chunks.processed += 1;
        self.status.completed_chunks += 1;
        self.recompute_progress();
        self.publish();
    }

    pub fn file_completed(&mut self, name: &str, bytes: u64, chunks: usize) {
        self.status.completed_files += 1;
        self.status.processed_bytes += bytes;
        self.status.current_file = None;
        self.status.current_file_chunks = ChunkProgress::default();
        self.recompute_progress();
        self.log(LogLevel::Success, format!("Indexed {name} ({chunks} chunks)"));
        self.publish();
    }

    pub fn file_failed(&mut self, name: &str, bytes: u64, reason: &str) {
        self.status.failed_files += 1;
        self.status.processed_bytes += bytes;
        self.status.current_file = None;
        self.status.current_file_chunks = ChunkProgress::default();
        self.recompute_progress();
        self.log(LogLevel::Error, format!("Failed {name}: {reason}"));
        self.publish();
    }

    pub fn file_removed(&mut self, name: &str, chunks: usize) {
        self.log(
            LogLevel::Success,
            format!("Removed {name} from index ({chunks} chunks)"),
        );
        self.publish();
    }

    pub fn operation_completed(&mut self, id: u64) {
        self.status.state = TrackerState::Completed;
        self.status.progress = 100.0;
        self.status.completed_operations += 1;
        self.log(
            LogLevel::Success,
            format!(
                "Operation {id} completed: {} indexed, {} failed",
                self.status.completed_files, self.status.failed_files
            ),
        );
        self.publish();
    }

    pub fn operation_failed(&mut self, id: u64, error: &str) {
        self.status.state = TrackerState::Failed;
        self.status.last_error = Some(error.to_string());
        self.status.completed_operations += 1;
        self.log(LogLevel::Error, format!("Operation {id} failed: {error}"));
        self.publish();
    }

    /// Queue drained; back to idle. Cumulative counters and the log ring
    /// survive.
    pub fn idle(&mut self) {
        self.status.state = TrackerState::Idle;
        self.status.is_running = false;
        self.status.operation_id = None;
        self.status.current_file = None;
        self.status.current_file_chunks = ChunkProgress::default();
        self.publish();
    }

    pub fn log(&mut self, level: LogLevel, message: String) {
        let entry = LogEntry {
            timestamp_unix_ms: current_unix_ms(),
            level,
            message,
        };
        self.logs.push_back(entry);
        while self.logs.len() > self.log_capacity {
            self.logs.pop_front();
        }
    }

    pub fn note(&mut self, level: LogLevel, message: String) {
        self.log(level, message);
        self.publish();
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexingStatus {
        let mut status = self.status.clone();
        status.logs = self.logs.iter().cloned().collect();
        status
    }

    fn recompute_progress(&mut self) {
        if self.status.total_files == 0 {
            return;
        }
        let terminal = (self.status.completed_files + self.status.failed_files) as f32;
        let current = match self.status.current_file_chunks.total {
            0 => 0.0,
            total => self.status.current_file_chunks.processed as f32 / total as f32,
        };
        let progress = (terminal + current) / self.status.total_files as f32 * 100.0;
        self.status.progress = progress.min(100.0);
    }

    fn publish(&self) {
        let _ = self.tx.send(self.snapshot());
    }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker(capacity: usize) -> (ProgressTracker, watch::Receiver<IndexingStatus>) {
        let (tx, rx) = watch::channel(IndexingStatus::initial());
        (ProgressTracker::new(capacity, tx), rx)
    }

    #[test]
    fn lifecycle_transitions() {
        let (mut tracker, rx) = tracker(50);
        assert_eq!(rx.borrow().state, TrackerState::Idle);

        tracker.operation_started(1, 2, 100);
        assert_eq!(rx.borrow().state, TrackerState::Running);
        assert!(rx.borrow().is_running);

        tracker.file_started("a.txt");
        tracker.file_chunk_total(2);
        tracker.chunk_processed();
        tracker.chunk_processed();
        tracker.file_completed("a.txt", 50, 2);
        tracker.file_started("b.txt");
        tracker.file_failed("b.txt", 50, "corrupt");

        tracker.operation_completed(1);
        assert_eq!(rx.borrow().state, TrackerState::Completed);
        assert_eq!(rx.borrow().progress, 100.0);

        tracker.idle();
        let status = rx.borrow().clone();
        assert_eq!(status.state, TrackerState::Idle);
        assert!(!status.is_running);
        assert_eq!(status.completed_operations, 1);
    }

    #[test]
    fn counters_are_monotone_while_running() {
        let (mut tracker, rx) = tracker(50);
        tracker.operation_started(7, 3, 300);

        let mut last_files = 0;
        let mut last_chunks = 0;
        for file in ["a.txt", "b.txt", "c.txt"] {
            tracker.file_started(file);
            tracker.file_chunk_total(4);
            for _ in 0..4 {
                tracker.chunk_processed();
                let status = rx.borrow().clone();
                assert!(status.completed_files >= last_files);
                assert!(status.completed_chunks >= last_chunks);
                last_files = status.completed_files;
                last_chunks = status.completed_chunks;
            }
            tracker.file_completed(file, 100, 4);
        }

        assert_eq!(rx.borrow().completed_chunks, 12);
        assert_eq!(rx.borrow().completed_files, 3);
    }

    #[test]
    fn progress_blends_current_file_fraction() {
        let (mut tracker, rx) = tracker(50);
        tracker.operation_started(1, 2, 0);
        tracker.file_started("a.txt");
        tracker.file_chunk_total(4);
        tracker.chunk_processed();
        tracker.chunk_processed();
        // one of two files half done
        let progress = rx.borrow().progress;
        assert!((progress - 25.0).abs() < 0.01, "got {progress}");
    }

    #[test]
    fn chunk_total_zero_means_parsing_phase() {
        let (mut tracker, rx) = tracker(50);
        tracker.operation_started(1, 1, 0);
        tracker.file_started("a.txt");
        assert_eq!(rx.borrow().current_file_chunks.total, 0);
        tracker.file_chunk_total(9);
        assert_eq!(rx.borrow().current_file_chunks.total, 9);
    }

    #[test]
    fn log_ring_evicts_oldest() {
        let (mut tracker, rx) = tracker(3);
        tracker.operation_started(1, 0, 0);
        for i in 0..5 {
            tracker.note(LogLevel::Info, format!("entry {i}"));
        }
        let logs = rx.borrow().logs.clone();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "entry 2");
        assert_eq!(logs[2].message, "entry 4");
    }

    #[test]
    fn per_file_failures_do_not_fail_the_operation() {
        let (mut tracker, rx) = tracker(50);
        tracker.operation_started(1, 1, 10);
        tracker.file_started("bad.txt");
        tracker.file_failed("bad.txt", 10, "unreadable");
        tracker.operation_completed(1);

        let status = rx.borrow().clone();
        assert_eq!(status.state, TrackerState::Completed);
        assert_eq!(status.failed_files, 1);
        assert!(status
            .logs
            .iter()
            .any(|entry| entry.level == LogLevel::Error));
    }

    #[test]
    fn store_failure_marks_operation_failed() {
        let (mut tracker, rx) = tracker(50);
        tracker.operation_started(1, 3, 0);
        tracker.operation_failed(1, "vector store unavailable");
        let status = rx.borrow().clone();
        assert_eq!(status.state, TrackerState::Failed);
        assert_eq!(
            status.last_error.as_deref(),
            Some("vector store unavailable")
        );
    }
}
