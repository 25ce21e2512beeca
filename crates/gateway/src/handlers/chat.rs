//! Chat handlers

use crate::history::Exchange;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use medrag_common::{
    errors::{AppError, Result},
    llm::render_generation,
    metrics::RequestMetrics,
    AgentTurn,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Chunks that were placed in the prompt, nearest first
    pub context: Vec<String>,
    /// True when `answer` is an `Error: ...` message from the generator
    pub is_error: bool,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub removed: usize,
}

fn check_query(request: &ChatRequest) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    if request.query.trim().is_empty() {
        return Err(AppError::validation("query must not be blank"));
    }
    Ok(())
}

/// Answer one question
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let metrics = RequestMetrics::start("POST", "/v1/chat");
    let start = Instant::now();

    if let Err(e) = check_query(&request) {
        metrics.finish(e.status_code().as_u16());
        return Err(e);
    }
    // whitespace only matters for the blank check; the agent sees the raw text
    let query = request.query.as_str();

    let turn = state.agent.run(query).await;
    let is_error = turn.is_error();
    let AgentTurn {
        context,
        generation,
    } = turn;
    let answer = render_generation(generation);

    state
        .history
        .push(Exchange::new(query, answer.clone(), is_error))
        .await;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        context_chunks = context.len(),
        is_error,
        latency_ms = processing_time_ms,
        "Chat answered"
    );
    metrics.finish(StatusCode::OK.as_u16());

    Ok(Json(ChatResponse {
        answer,
        context,
        is_error,
        processing_time_ms,
    }))
}

/// Past exchanges, newest first
pub async fn history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        exchanges: state.history.recent().await,
    })
}

pub async fn clear_history(State(state): State<AppState>) -> Json<ClearedResponse> {
    let removed = state.history.clear().await;
    tracing::info!(removed, "Chat history cleared");
    Json(ClearedResponse { removed })
}
