//! Text chunking module
//!
//! Splits document text into fixed-size word windows for embedding.

use crate::documents::Document;
use tracing::debug;

/// Default number of words per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Words per chunk; the last chunk of a document may be shorter
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

/// A text chunk with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk within its document
    pub index: usize,
    /// Words joined by single spaces
    pub content: String,
    pub word_count: usize,
}

/// Split text into consecutive groups of `chunk_size` whitespace-separated words.
///
/// No overlap. Whitespace runs (including newlines) collapse to one space.
/// A `chunk_size` of zero is treated as one.
pub fn chunk_words(text: &str, chunk_size: usize) -> Vec<TextChunk> {
    let size = chunk_size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();

    let chunks: Vec<TextChunk> = words
        .chunks(size)
        .enumerate()
        .map(|(index, group)| TextChunk {
            index,
            content: group.join(" "),
            word_count: group.len(),
        })
        .collect();

    debug!(
        words = words.len(),
        chunk_count = chunks.len(),
        chunk_size = size,
        "Text chunked"
    );

    chunks
}

/// Chunk every document in order and flatten the result
pub fn chunk_documents(docs: &[Document], config: &ChunkingConfig) -> Vec<TextChunk> {
    docs.iter()
        .flat_map(|doc| {
            let chunks = chunk_words(&doc.text, config.chunk_size);
            for chunk in &chunks {
                debug!(
                    source = %doc.source,
                    index = chunk.index,
                    word_count = chunk.word_count,
                    "Chunk ready"
                );
            }
            chunks
        })
        .collect()
}
