//! # Docdex Text Chunker
//!
//! Sliding-window chunking of extracted document text.
//!
//! Splits a document body into consecutive windows of at most `max_chars`
//! characters, where each window after the first starts `overlap` characters
//! before the end of the previous one. Windows shorter than `min_chars` are
//! dropped. The split is deterministic: the same text and configuration
//! always produce the same chunk sequence, which the indexing pipeline
//! relies on for idempotent re-indexing.

mod chunker;
mod error;

pub use chunker::{Chunker, ChunkerConfig, TextChunk};
pub use error::{ChunkerError, Result};
