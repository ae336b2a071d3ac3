//! Sliding-window text chunker.
//!
//! Splits extracted document text into fixed-size [`Chunk`]s that overlap
//! their predecessor by a configurable number of characters, so a sentence
//! cut at a window edge still appears whole in one of the two neighbours.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text, stored
//! alongside the chunk.
//!
//! # Algorithm
//!
//! Lengths are counted in Unicode scalar values, never bytes, so no window
//! edge can fall inside a multi-byte character.
//!
//! 1. Start a window at character 0.
//! 2. Emit `text[start .. min(start + size, len)]`.
//! 3. If the window reached the end of the text, stop.
//! 4. Otherwise the next window starts `overlap` characters before this
//!    window's end.
//!
//! Dropping the first `overlap` characters of every chunk after the first
//! and concatenating reconstructs the input exactly. The number of chunks
//! for a text of `n > overlap` characters is `ceil((n - overlap) / (size - overlap))`.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(10, 2).unwrap();
//! let chunks = chunker.chunk("doc_1", "abcdefghijklmnop");
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text, "ijklmnop");
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Fixed-size, fixed-overlap chunker. Construct with [`Chunker::new`],
/// which rejects `size == 0` and `overlap >= size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config("chunk size must be > 0".to_string()));
        }
        if overlap >= size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into borrowed windows. Empty text yields no windows.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut windows = Vec::new();
        if char_len == 0 {
            return windows;
        }

        let mut start = 0usize;
        loop {
            let end = (start + self.size).min(char_len);
            windows.push(&text[boundaries[start]..boundaries[end]]);
            if end == char_len {
                break;
            }
            start = end - self.overlap;
        }
        windows
    }

    /// Split `text` into [`Chunk`]s owned by `document_id`.
    ///
    /// Chunk indices are contiguous from 0.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| make_chunk(document_id, i as i64, piece))
            .collect()
    }
}

/// Hex SHA-256 of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash: content_hash(text),
    }
}
