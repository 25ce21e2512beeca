//! Vector similarity storage using pgvector
//!
//! One append-only table of `(id, content, embedding)` rows. Nearest-neighbour
//! search is delegated to the pgvector distance operators.

use super::DbPool;
use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Distance metric used to order search results.
///
/// Must match the metric the index was built for; rows are compared with the
/// corresponding pgvector operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance, `<=>`
    #[default]
    Cosine,
    /// Euclidean distance, `<->`
    L2,
}

impl DistanceMetric {
    /// pgvector operator for this metric
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::L2 => "<->",
        }
    }

    /// Distance between two vectors of equal length.
    ///
    /// Cosine distance against a zero vector is 1.0.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

/// Persistent store of embedded chunks supporting similarity search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing table if absent. Safe to call on every run.
    async fn ensure_schema(&self) -> Result<()>;

    /// Append one row. Duplicate content is kept as a separate row.
    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<()>;

    /// Append every row or none of them.
    ///
    /// All rows are validated before any is stored.
    async fn insert_batch(&self, rows: &[(String, Vec<f32>)]) -> Result<()>;

    /// Content of the `top_k` nearest rows, most similar first.
    ///
    /// An empty or missing table yields an empty vector.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>>;

    /// Number of stored rows
    async fn count(&self) -> Result<u64>;

    /// Check the backing store is reachable
    async fn ping(&self) -> Result<()>;

    /// Configured embedding dimension
    fn dimension(&self) -> usize;
}

/// Check that `name` can be interpolated into DDL as a bare identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Format an embedding as a pgvector text literal, e.g. `[0.1,0.2,0.3]`
pub fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

pub(crate) fn check_dimension(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(AppError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_row(expected: usize, content: &str, embedding: &[f32]) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::validation("chunk content must not be empty"));
    }
    check_dimension(expected, embedding)
}

#[derive(Debug, FromQueryResult)]
struct ContentRow {
    content: String,
}

#[derive(Debug, FromQueryResult)]
struct PresenceRow {
    present: bool,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

/// Vector index stored in a Postgres table with the pgvector extension
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: DbPool,
    table: String,
    dimension: usize,
    metric: DistanceMetric,
}

impl PgVectorIndex {
    /// Create an index over `table`; the name is validated before use in SQL
    pub fn new(
        pool: DbPool,
        table: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(AppError::config(format!(
                "'{}' is not a valid table name",
                table
            )));
        }
        Ok(Self {
            pool,
            table,
            dimension,
            metric,
        })
    }

    /// Create an index from the database section of the configuration
    pub fn from_config(pool: DbPool, config: &DatabaseConfig, dimension: usize) -> Result<Self> {
        Self::new(pool, config.table.clone(), dimension, config.distance)
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                embedding VECTOR({}) NOT NULL
            )",
            self.table, self.dimension
        )
    }

    fn insert_statement(&self, content: &str, embedding: &[f32]) -> Statement {
        Statement::from_sql_and_values(
            DbBackend::Postgres,
            self.insert_sql(),
            [content.to_string().into(), vector_literal(embedding).into()],
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (content, embedding) VALUES ($1, $2::vector)",
            self.table
        )
    }

    fn query_sql(&self) -> String {
        format!(
            "SELECT content FROM {} ORDER BY embedding {} $1::vector LIMIT $2",
            self.table,
            self.metric.operator()
        )
    }

    async fn table_exists(&self) -> Result<bool> {
        let row = PresenceRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT to_regclass($1) IS NOT NULL AS present",
            [self.table.clone().into()],
        ))
        .one(self.pool.connection())
        .await?;

        Ok(row.map(|r| r.present).unwrap_or(false))
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.connection();
        conn.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;
        conn.execute_unprepared(&self.create_table_sql()).await?;

        info!(table = %self.table, dimension = self.dimension, "Vector table ready");
        Ok(())
    }

    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<()> {
        check_row(self.dimension, content, embedding)?;
        self.pool
            .connection()
            .execute(self.insert_statement(content, embedding))
            .await?;
        Ok(())
    }

    async fn insert_batch(&self, rows: &[(String, Vec<f32>)]) -> Result<()> {
        for (content, embedding) in rows {
            check_row(self.dimension, content, embedding)?;
        }
        if rows.is_empty() {
            return Ok(());
        }

        // dropping the transaction on error rolls it back
        let txn = self.pool.connection().begin().await?;
        for (content, embedding) in rows {
            txn.execute(self.insert_statement(content, embedding)).await?;
        }
        txn.commit().await?;

        debug!(table = %self.table, rows = rows.len(), "Batch committed");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        check_dimension(self.dimension, embedding)?;
        if top_k == 0 || !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let rows = ContentRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            self.query_sql(),
            [vector_literal(embedding).into(), (top_k as i64).into()],
        ))
        .all(self.pool.connection())
        .await?;

        debug!(table = %self.table, top_k, returned = rows.len(), "Vector query complete");
        Ok(rows.into_iter().map(|r| r.content).collect())
    }

    async fn count(&self) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }
        let row = CountRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT COUNT(*) AS total FROM {}", self.table),
        ))
        .one(self.pool.connection())
        .await?;

        Ok(row.map(|r| r.total.max(0) as u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("medical_docs"));
        assert!(is_valid_identifier("_chunks2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2chunks"));
        assert!(!is_valid_identifier("public.chunks"));
        assert!(!is_valid_identifier("docs; DROP TABLE x"));
    }

    #[test]
    fn test_metric_operators() {
        assert_eq!(DistanceMetric::Cosine.operator(), "<=>");
        assert_eq!(DistanceMetric::L2.operator(), "<->");
    }

    #[test]
    fn test_cosine_distance() {
        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_l2_distance() {
        let metric = DistanceMetric::L2;
        assert!((metric.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_row_checks() {
        assert!(check_row(3, "text", &[0.0, 0.0, 0.0]).is_ok());
        assert!(matches!(
            check_row(3, "  ", &[0.0, 0.0, 0.0]),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            check_row(3, "text", &[0.0; 4]),
            Err(AppError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    fn offline_index(table: &str, metric: DistanceMetric) -> Result<PgVectorIndex> {
        let pool = DbPool {
            conn: sea_orm::DatabaseConnection::Disconnected,
        };
        PgVectorIndex::new(pool, table, 384, metric)
    }

    #[test]
    fn test_statements() {
        let index = offline_index("medical_docs", DistanceMetric::Cosine).unwrap();
        assert!(index
            .create_table_sql()
            .contains("embedding VECTOR(384) NOT NULL"));
        assert_eq!(
            index.insert_sql(),
            "INSERT INTO medical_docs (content, embedding) VALUES ($1, $2::vector)"
        );
        assert_eq!(
            index.query_sql(),
            "SELECT content FROM medical_docs ORDER BY embedding <=> $1::vector LIMIT $2"
        );

        let l2 = offline_index("medical_docs", DistanceMetric::L2).unwrap();
        assert!(l2.query_sql().contains("embedding <-> $1::vector"));
    }

    #[tokio::test]
    async fn test_batch_validated_before_connecting() {
        let index = offline_index("medical_docs", DistanceMetric::Cosine).unwrap();
        let rows = vec![
            ("aspirin".to_string(), vec![0.0; 384]),
            ("ibuprofen".to_string(), vec![0.0; 383]),
        ];
        assert!(matches!(
            index.insert_batch(&rows).await,
            Err(AppError::DimensionMismatch { expected: 384, actual: 383 })
        ));
        assert!(index.insert_batch(&[]).await.is_ok());
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        assert!(matches!(
            offline_index("docs; DROP TABLE x", DistanceMetric::Cosine),
            Err(AppError::Configuration { .. })
        ));
    }
}
