//! Ingestion error types

use medrag_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read {path}: {source}")]
    ReadDocument {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteDocument {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Documents directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Embedding count mismatch: {chunks} chunks but {embeddings} embeddings")]
    EmbeddingCountMismatch { chunks: usize, embeddings: usize },

    #[error("URL discovery failed: {0}")]
    Discovery(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
