//! # Docdex Search
//!
//! Query-side surface over the vector index.
//!
//! Embeds the query text, asks the index for the nearest chunks, and shapes
//! the results for callers: file name, path, chunk content, page, clamped
//! similarity, and file metadata. The result limit is clamped to a
//! configured maximum so callers cannot request unbounded scans.

mod engine;
mod error;

pub use engine::{SearchEngine, SearchHit};
pub use error::{Result, SearchError};
