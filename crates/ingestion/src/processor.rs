//! Ingestion processor
//!
//! Core batch logic: chunk documents, embed every chunk and append the
//! rows to the vector index.

use crate::chunker::{chunk_documents, ChunkingConfig};
use crate::documents::{load_documents, Document};
use crate::errors::{IngestionError, Result};
use medrag_common::{Embedder, VectorIndex};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Counts from one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} docs into {} chunks.",
            self.documents, self.chunks
        )
    }
}

pub struct IngestionProcessor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking_config: ChunkingConfig,
}

impl IngestionProcessor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunking_config: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking_config,
        }
    }

    /// Chunk, embed and store `docs`.
    ///
    /// Rows are appended; running twice over the same documents stores
    /// every chunk twice.
    #[instrument(skip(self, docs), fields(documents = docs.len()))]
    pub async fn process(&self, docs: &[Document]) -> Result<IngestionReport> {
        let start = Instant::now();
        self.index.ensure_schema().await?;

        let chunks = chunk_documents(docs, &self.chunking_config);
        info!(chunk_count = chunks.len(), "Documents chunked");

        let texts: Vec<String> = chunks.into_iter().map(|c| c.content).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(IngestionError::EmbeddingCountMismatch {
                chunks: texts.len(),
                embeddings: embeddings.len(),
            });
        }

        let rows: Vec<(String, Vec<f32>)> = texts.into_iter().zip(embeddings).collect();
        self.index.insert_batch(&rows).await?;

        let report = IngestionReport {
            documents: docs.len(),
            chunks: rows.len(),
        };
        medrag_common::metrics::record_ingestion(report.documents, report.chunks);
        info!(
            documents = report.documents,
            chunks = report.chunks,
            model = self.embedder.model_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Load every document in `dir` and ingest it
    pub async fn process_dir(&self, dir: &Path) -> Result<IngestionReport> {
        let docs = load_documents(dir).await?;
        self.process(&docs).await
    }
}
