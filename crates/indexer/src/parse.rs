use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Document formats the pipeline knows how to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
    Md,
    Html,
    Xlsx,
}

impl DocumentFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Md),
            "html" | "htm" => Some(Self::Html),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Detect format from file path.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Xlsx => "xlsx",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub text: String,
}

/// Byte-to-text extraction capability.
///
/// The scanner only enumerates files whose format the configured parser
/// [`supports`](Parser::supports); `parse` may still fail per file with
/// [`ParseError::CorruptDocument`], which is recorded and skipped.
pub trait Parser: Send + Sync {
    fn supports(&self, format: DocumentFormat) -> bool;

    fn parse(&self, bytes: &[u8], format: DocumentFormat)
        -> std::result::Result<ParsedDocument, ParseError>;
}

/// Reference parser for text-bearing formats.
///
/// Reads `.txt` and `.md` as UTF-8 and strips tags from `.html`. Rich
/// formats stay behind the [`Parser`] seam for an external implementation.
#[derive(Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"))
}

impl Parser for PlainTextParser {
    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(
            format,
            DocumentFormat::Txt | DocumentFormat::Md | DocumentFormat::Html
        )
    }

    fn parse(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> std::result::Result<ParsedDocument, ParseError> {
        if !self.supports(format) {
            return Err(ParseError::UnsupportedFormat(format.as_str().to_string()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::CorruptDocument(format!("invalid UTF-8: {e}")))?;

        let text = match format {
            DocumentFormat::Html => tag_pattern().replace_all(text, " ").into_owned(),
            _ => text.to_string(),
        };

        Ok(ParsedDocument {
            text: text.trim().to_string(),
        })
    }
}
