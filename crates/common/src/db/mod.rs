//! Database layer for MedRAG
//!
//! Provides:
//! - Connection pool management (SeaORM over SQLx)
//! - The `VectorIndex` abstraction over the chunk table
//! - A pgvector-backed index and an in-memory index

mod memory;
mod vector_index;

pub use memory::InMemoryIndex;
pub use vector_index::{
    is_valid_identifier, vector_literal, DistanceMetric, PgVectorIndex, VectorIndex,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Open a connection pool against `url` using the limits from configuration
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to vector store database...");

        let mut opts = ConnectOptions::new(url.to_string());
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Underlying SeaORM connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }

    /// Close every connection in the pool
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connections closed");
        Ok(())
    }
}
