//! Configuration management for MedRAG services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with MEDRAG__)
//! - The bare `POSTGRES_URI` / `GROQ_API_KEY` variables
//! - Configuration files (config/default.toml, config/<env>.toml, config/local.toml)
//! - Default values

use crate::db::{is_valid_identifier, DistanceMetric};
use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chat gateway configuration
    pub server: ServerConfig,

    /// Vector store database configuration
    pub database: DatabaseConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// Hosted LLM configuration
    pub llm: LlmConfig,

    /// Retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Ingestion batch job configuration
    pub ingestion: IngestionConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Number of chat exchanges kept in the gateway history
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string (pgvector extension required)
    pub url: Option<String>,

    /// Table holding the embedded chunks
    pub table: String,

    /// Distance operator used for nearest-neighbour search
    pub distance: DistanceMetric,

    /// Maximum number of connections
    pub max_connections: u32,

    /// Minimum number of connections
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider: local, hash
    pub provider: String,

    /// Sentence-embedding model to load
    pub model: String,

    /// Embedding dimension
    pub dimension: usize,

    /// Directory the model weights are downloaded to
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while downloading weights
    pub show_download_progress: bool,

    /// Batch size for embedding requests
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,

    /// API credential
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum completion tokens
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory of scraped plain-text documents
    pub docs_dir: PathBuf,

    /// Chunk size in words
    pub chunk_size: usize,

    /// Attempts per page before it is skipped
    pub max_attempts: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum number of URLs kept from discovery
    pub url_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or EnvFilter directive
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_history_limit() -> usize { 100 }
fn default_table() -> String { "medical_docs".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "local".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_batch_size() -> usize { 32 }
fn default_llm_endpoint() -> String { "https://api.groq.com/openai/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "llama-3.1-8b-instant".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_top_k() -> usize { 3 }
fn default_docs_dir() -> PathBuf { PathBuf::from("data/docs") }
fn default_chunk_size() -> usize { 500 }
fn default_max_attempts() -> u32 { 3 }
fn default_request_timeout() -> u64 { 10 }
fn default_url_limit() -> usize { 100 }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 0 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: default_table(),
            distance: DistanceMetric::default(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            cache_dir: None,
            show_download_progress: false,
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
            url_limit: default_url_limit(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with MEDRAG__ prefix
            // e.g., MEDRAG__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("MEDRAG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )

            // Bare deployment variables, unless the prefixed form is set
            .set_override_option(
                "database.url",
                env_with_fallback("MEDRAG__DATABASE__URL", "POSTGRES_URI"),
            )?
            .set_override_option(
                "llm.api_key",
                env_with_fallback("MEDRAG__LLM__API_KEY", "GROQ_API_KEY"),
            )?
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("MEDRAG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check values that would otherwise fail deep inside the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.ingestion.chunk_size == 0 {
            return Err(AppError::config("ingestion.chunk_size must be at least 1"));
        }
        if self.embedding.dimension == 0 {
            return Err(AppError::config("embedding.dimension must be at least 1"));
        }
        if self.retrieval.top_k == 0 {
            return Err(AppError::config("retrieval.top_k must be at least 1"));
        }
        if !is_valid_identifier(&self.database.table) {
            return Err(AppError::config(format!(
                "database.table '{}' is not a valid SQL identifier",
                self.database.table
            )));
        }
        Ok(())
    }

    /// Connection string for the vector store, or a configuration error
    pub fn require_database_url(&self) -> Result<&str> {
        non_blank(self.database.url.as_deref()).ok_or_else(|| {
            AppError::config("database url missing: set POSTGRES_URI or MEDRAG__DATABASE__URL")
        })
    }

    /// LLM credential, or a configuration error
    pub fn require_llm_api_key(&self) -> Result<&str> {
        non_blank(self.llm.api_key.as_deref()).ok_or_else(|| {
            AppError::config("LLM api key missing: set GROQ_API_KEY or MEDRAG__LLM__API_KEY")
        })
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| std::env::var(fallback).ok())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
