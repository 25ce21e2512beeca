//! Conversation history kept by the gateway
//!
//! The agent is stateless; this is the only place past exchanges live.
//! Bounded, in memory, lost on restart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One question and the answer shown for it
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub id: Uuid,
    pub query: String,
    pub answer: String,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(query: impl Into<String>, answer: impl Into<String>, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            answer: answer.into(),
            is_error,
            created_at: Utc::now(),
        }
    }
}

pub struct History {
    entries: RwLock<VecDeque<Exchange>>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            limit,
        }
    }

    /// Record an exchange, evicting the oldest once the limit is reached
    pub async fn push(&self, exchange: Exchange) {
        if self.limit == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(exchange);
    }

    /// All kept exchanges, newest first
    pub async fn recent(&self) -> Vec<Exchange> {
        self.entries.read().await.iter().rev().cloned().collect()
    }

    /// Drop every exchange, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}
