//! In-process vector index with brute-force search.
//!
//! Same contract as the pgvector table: append-only rows, exact
//! nearest-neighbour ordering, empty result on an empty index. Used by
//! the test suites of every crate.

use super::vector_index::{check_dimension, check_row, DistanceMetric, VectorIndex};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct Row {
    content: String,
    embedding: Vec<f32>,
}

pub struct InMemoryIndex {
    rows: RwLock<Vec<Row>>,
    dimension: usize,
    metric: DistanceMetric,
}

impl InMemoryIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            dimension,
            metric,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn poisoned() -> AppError {
        AppError::Internal {
            message: "in-memory index lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<()> {
        check_row(self.dimension, content, embedding)?;
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        rows.push(Row {
            content: content.to_string(),
            embedding: embedding.to_vec(),
        });
        Ok(())
    }

    async fn insert_batch(&self, batch: &[(String, Vec<f32>)]) -> Result<()> {
        for (content, embedding) in batch {
            check_row(self.dimension, content, embedding)?;
        }
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        rows.extend(batch.iter().map(|(content, embedding)| Row {
            content: content.clone(),
            embedding: embedding.clone(),
        }));
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        check_dimension(self.dimension, embedding)?;
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;

        let mut scored: Vec<(f32, &Row)> = rows
            .iter()
            .map(|row| (self.metric.distance(embedding, &row.embedding), row))
            .collect();
        // stable sort: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, row)| row.content.clone())
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
