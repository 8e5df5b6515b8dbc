use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Window parameters for splitting document text.
///
/// `max_chars` bounds the window length, `overlap` is the number of
/// characters shared between adjacent windows, and windows shorter than
/// `min_chars` are discarded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub max_chars: usize,
    pub overlap: usize,
    pub min_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap: 50,
            min_chars: 50,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(ChunkerError::InvalidConfig(
                "max_chars must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.max_chars {
            return Err(ChunkerError::InvalidConfig(format!(
                "overlap ({}) must be smaller than max_chars ({})",
                self.overlap, self.max_chars
            )));
        }
        if self.min_chars > self.max_chars {
            return Err(ChunkerError::InvalidConfig(format!(
                "min_chars ({}) must not exceed max_chars ({})",
                self.min_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// One window of document text. Indices are contiguous from 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
}

/// Deterministic sliding-window chunker.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into overlapping windows.
    ///
    /// Window boundaries are measured in characters, not bytes, so
    /// multi-byte input never splits inside a code point. No window is
    /// started once the previous one already reached the end of the text.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char start, plus the end sentinel.
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        let total_chars = offsets.len() - 1;

        let stride = self.config.max_chars - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < total_chars {
            let end = (start + self.config.max_chars).min(total_chars);
            if end - start >= self.config.min_chars {
                let content = text[offsets[start]..offsets[end]].to_string();
                chunks.push(TextChunk { index, content });
                index += 1;
            }
            if end == total_chars {
                break;
            }
            start += stride;
        }

        chunks
    }
}
