//! # Docdex Indexer
//!
//! Incremental indexing of user-selected files and folders.
//!
//! ## Pipeline
//!
//! ```text
//! Selection change / rescan tick
//!     │
//!     ├──> Path selection (ancestor/descendant collapsing)
//!     │      └─> Watched roots
//!     │
//!     ├──> Change detector (SHA-256 fingerprints)
//!     │      └─> New / Modified / Unchanged / Deleted
//!     │
//!     └──> Index writer (parse → chunk → embed → upsert)
//!            └─> Vector index, progress feed
//! ```
//!
//! Operations run strictly one at a time on the orchestrator loop; a new
//! selection change queues behind the running operation. Unchanged files
//! are never reprocessed: a file is re-embedded only when its content
//! fingerprint differs from the stored record.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docdex_indexer::{DocdexConfig, IndexService, PlainTextParser, SelectionRequest};
//! use docdex_vector_store::{HashingEmbedder, InMemoryIndex};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = IndexService::start(
//!         DocdexConfig::default(),
//!         Arc::new(PlainTextParser::new()),
//!         Arc::new(HashingEmbedder::default()),
//!         Arc::new(InMemoryIndex::new()),
//!     )
//!     .await?;
//!
//!     service
//!         .apply_selection(vec![SelectionRequest {
//!             path: "/home/user/docs".into(),
//!             included: true,
//!         }])
//!         .await?;
//!
//!     let status = service.status();
//!     println!("indexing: {}", status.is_running);
//!     Ok(())
//! }
//! ```

mod change;
mod config;
mod error;
mod orchestrator;
mod parse;
mod progress;
mod records;
mod selection;
mod writer;

pub use change::{ChangeDetector, FileChange};
pub use config::{load_config, DocdexConfig, IndexingConfig, SearchConfig};
pub use error::{FileFailure, IndexerError, Result};
pub use orchestrator::{IndexService, IndexStats};
pub use parse::{DocumentFormat, ParseError, ParsedDocument, Parser, PlainTextParser};
pub use progress::{ChunkProgress, IndexingStatus, LogEntry, LogLevel, ProgressTracker, TrackerState};
pub use records::{FileRecord, FileRecordStore};
pub use selection::{diff, PathSelection, SelectionDiff, SelectionRequest};
pub use writer::{FileMeta, IndexWriter, WriteError};
