//! Text extraction interface.
//!
//! The ingestion pipeline detects a [`FileKind`] from the upload's file
//! name and hands the bytes to a [`TextExtractor`]. Format-specific parsing
//! (PDF, OOXML) lives in the `docchat` app crate.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// File types the pipeline knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Text,
}

impl FileKind {
    /// Detect the kind from a file name's extension (case-insensitive).
    ///
    /// Any other extension, or none at all, is
    /// [`Error::UnsupportedFileType`].
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "docx" => Ok(FileKind::Docx),
            "txt" => Ok(FileKind::Text),
            "" => Err(Error::UnsupportedFileType(format!(
                "'{}' has no file extension",
                filename
            ))),
            other => Err(Error::UnsupportedFileType(format!(".{}", other))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Text => "txt",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Converts raw file bytes into plain UTF-8 text.
///
/// Multi-page formats join their pages with newlines. Extraction is
/// CPU-bound; async callers should run it on a blocking thread.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], kind: FileKind) -> Result<String>;
}
