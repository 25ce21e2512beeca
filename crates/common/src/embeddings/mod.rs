//! Embedding model abstraction
//!
//! Provides a unified interface for sentence embedders:
//! - Local pretrained models (all-MiniLM-L6-v2 and friends) via fastembed
//! - A deterministic feature-hashing embedder for tests and offline runs

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

fn ensure_dimensions(expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    match embeddings.iter().find(|e| e.len() != expected) {
        Some(bad) => Err(AppError::DimensionMismatch {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Map a configured model name to a fastembed model and its native dimension
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let normalized = name.trim().to_ascii_lowercase();
    let short = normalized.rsplit('/').next().unwrap_or(&normalized);
    match short {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        _ => Err(AppError::config(format!(
            "unsupported embedding model '{}'",
            name
        ))),
    }
}

/// Pretrained sentence-embedding model running in-process.
///
/// Weights are fetched and loaded once at construction; inference runs on
/// the blocking thread pool.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl LocalEmbedder {
    /// Load the configured model. Fails when weights or the runtime are unavailable.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let (kind, native_dimension) = resolve_model(&config.model)?;
        if native_dimension != config.dimension {
            return Err(AppError::config(format!(
                "model '{}' produces {} dimensions but embedding.dimension is {}",
                config.model, native_dimension, config.dimension
            )));
        }

        let mut options =
            InitOptions::new(kind).with_show_download_progress(config.show_download_progress);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        let model = TextEmbedding::try_new(options).map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to load model '{}': {}", config.model, e),
        })?;

        info!(model = %config.model, dimension = native_dimension, "Embedding model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.model.clone(),
            dimension: native_dimension,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;

        let embeddings = tokio::task::spawn_blocking(move || {
            let model = model.lock().map_err(|_| AppError::EmbeddingError {
                message: "embedding model lock poisoned".to_string(),
            })?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| AppError::EmbeddingError {
                    message: format!("Inference failed: {}", e),
                })
        })
        .await
        .map_err(|e| AppError::EmbeddingError {
            message: format!("Embedding task failed: {}", e),
        })??;

        ensure_dimensions(self.dimension, &embeddings)?;
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.run(vec![text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets; the counts are L2-normalised. Texts sharing words end
/// up close under cosine distance, which is enough for tests and offline runs.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Synchronous embedding of one text
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bytes) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration.
///
/// Model loading happens on the blocking pool, so this is safe to call from
/// inside the runtime at startup.
pub async fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "local" => {
            let config = config.clone();
            let embedder = tokio::task::spawn_blocking(move || LocalEmbedder::load(&config))
                .await
                .map_err(|e| AppError::EmbeddingError {
                    message: format!("Model loading task failed: {}", e),
                })??;
            Ok(Arc::new(embedder))
        }
        "hash" => {
            tracing::warn!("Using hash embedder; retrieval quality is lexical only");
            Ok(Arc::new(HashEmbedder::new(config.dimension)))
        }
        other => Err(AppError::config(format!(
            "unknown embedding provider '{}'",
            other
        ))),
    }
}
