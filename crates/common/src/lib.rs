//! MedRAG Common Library
//!
//! Shared code for the ingestion job and the chat gateway:
//! - Configuration management
//! - Error types and handling
//! - Embedding model abstraction
//! - Vector index (pgvector and in-memory)
//! - LLM answer generator
//! - Retrieval, prompt composition and the answering agent
//! - Logging and metrics setup

pub mod config;
pub mod context;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::{Agent, AgentTurn, Retriever};
pub use db::{DbPool, InMemoryIndex, PgVectorIndex, VectorIndex};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{AnswerGenerator, GenerationError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
