//! Nearest-chunk retrieval for a query

use crate::db::VectorIndex;
use crate::embeddings::Embedder;
use crate::errors::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Number of chunks retrieved when the caller does not say otherwise
pub const DEFAULT_TOP_K: usize = 3;

/// Embeds a query and asks the vector index for its nearest chunks.
///
/// Results come back exactly as the index ordered them; there is no
/// re-ranking and no relevance threshold.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve with the configured `top_k`, degrading failures to no context
    pub async fn retrieve_default(&self, query: &str) -> Vec<String> {
        self.retrieve(query, self.top_k).await
    }

    /// Retrieve the `top_k` nearest chunks, propagating embedding and index errors
    pub async fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let start = Instant::now();
        let embedding = self.embedder.embed(query).await?;
        let chunks = self.index.query(&embedding, top_k).await?;

        debug!(
            top_k,
            returned = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        crate::metrics::record_retrieval(chunks.len(), start.elapsed());
        Ok(chunks)
    }

    /// Retrieve the `top_k` nearest chunks.
    ///
    /// An unreachable index or a failed embedding is logged and treated as
    /// "no context found" so the agent can still answer.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Vec<String> {
        match self.try_retrieve(query, top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, code = ?e.code(), "Retrieval failed, continuing without context");
                crate::metrics::record_retrieval_fallback();
                Vec::new()
            }
        }
    }
}
