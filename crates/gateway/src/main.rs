//! MedRAG Chat Gateway
//!
//! HTTP front end for the medical RAG agent.
//! Handles:
//! - Question answering over the ingested corpus
//! - Conversation history (the agent itself is stateless)
//! - Liveness and readiness checks
//! - Observability (logging, request ids, metrics)

mod handlers;
mod history;

use axum::{
    routing::{get, post},
    Router,
};
use history::History;
use medrag_common::{
    config::AppConfig,
    context::{Agent, Retriever},
    db::{DbPool, PgVectorIndex},
    embeddings::create_embedder,
    errors::{AppError, Result},
    llm::ChatCompletionsGenerator,
    metrics::{self, ANSWER_BUCKETS},
    telemetry, VectorIndex, VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<Agent>,
    pub index: Arc<dyn VectorIndex>,
    pub history: Arc<History>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, agent: Agent, index: Arc<dyn VectorIndex>) -> Self {
        let history = Arc::new(History::new(config.server.history_limit));
        Self {
            config,
            agent: Arc::new(agent),
            index,
            history,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    telemetry::init(&config.observability)?;
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    info!("Starting MedRAG chat gateway v{}", VERSION);

    // Credentials first: refuse to start without them
    let database_url = config.require_database_url()?.to_string();
    let generator = ChatCompletionsGenerator::from_config(&config)?;

    let config = Arc::new(config);

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    let pool = DbPool::connect(&database_url, &config.database).await?;
    let index: Arc<dyn VectorIndex> = Arc::new(PgVectorIndex::from_config(
        pool.clone(),
        &config.database,
        config.embedding.dimension,
    )?);

    info!(model = %config.embedding.model, "Loading embedding model...");
    let embedder = create_embedder(&config.embedding).await?;

    let retriever = Retriever::new(embedder, index.clone()).with_top_k(config.retrieval.top_k);
    let agent = Agent::new(retriever, Arc::new(generator));
    let state = AppState::new(config.clone(), agent, index);

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::config(format!("invalid server address: {}", e)))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await?;
    info!("Server shutdown complete");
    Ok(())
}

/// Serve Prometheus metrics on their own port
fn install_metrics_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Suffix("answer_duration_seconds".to_string()),
            ANSWER_BUCKETS,
        )
        .and_then(|builder| builder.install())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;
    info!(port, "Prometheus metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route(
            "/history",
            get(handlers::chat::history).delete(handlers::chat::clear_history),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use medrag_common::{
        db::{DistanceMetric, InMemoryIndex},
        embeddings::HashEmbedder,
        llm::{AnswerGenerator, GenerationError},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
            let question = prompt
                .split("Question:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\n").next())
                .unwrap_or_default();
            Ok(format!("You asked: {}", question))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl AnswerGenerator for DownGenerator {
        async fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
            Err(GenerationError::Transport {
                endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                message: "connection reset".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    async fn test_app(generator: Arc<dyn AnswerGenerator>, history_limit: usize) -> Router {
        let embedder = Arc::new(HashEmbedder::new(384));
        let index = Arc::new(InMemoryIndex::new(384, DistanceMetric::Cosine));
        for chunk in ["Aspirin reduces fever.", "Ibuprofen reduces inflammation."] {
            index.insert(chunk, &embedder.embed_text(chunk)).await.unwrap();
        }

        let mut config = AppConfig::default();
        config.server.history_limit = history_limit;

        let agent = Agent::new(Retriever::new(embedder, index.clone()), generator);
        create_router(AppState::new(Arc::new(config), agent, index))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_with_reachable_index() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        let (status, body) = send(&app, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["vector_index"]["status"], "up");
    }

    #[tokio::test]
    async fn test_chat_returns_answer_and_context() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/chat",
            Some(json!({ "query": "What reduces fever?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "You asked: What reduces fever?");
        assert_eq!(body["context"][0], "Aspirin reduces fever.");
        assert_eq!(body["is_error"], false);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        for query in ["", "   \n"] {
            let (status, body) =
                send(&app, Method::POST, "/v1/chat", Some(json!({ "query": query }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }

        let (_, history) = send(&app, Method::GET, "/v1/history", None).await;
        assert_eq!(history["exchanges"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_query_passed_through_untrimmed() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/chat",
            Some(json!({ "query": "  What reduces fever?  " })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "You asked:   What reduces fever?  ");

        let (_, history) = send(&app, Method::GET, "/v1/history", None).await;
        assert_eq!(history["exchanges"][0]["query"], "  What reduces fever?  ");
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported_not_raised() {
        let app = test_app(Arc::new(DownGenerator), 10).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/chat",
            Some(json!({ "query": "What reduces fever?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_error"], true);
        assert!(body["answer"].as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_history_newest_first_and_clear() {
        let app = test_app(Arc::new(EchoGenerator), 2).await;
        for query in ["first", "second", "third"] {
            send(&app, Method::POST, "/v1/chat", Some(json!({ "query": query }))).await;
        }

        let (status, body) = send(&app, Method::GET, "/v1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        let queries: Vec<&str> = body["exchanges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["query"].as_str().unwrap())
            .collect();
        assert_eq!(queries, vec!["third", "second"]);

        let (status, body) = send(&app, Method::DELETE, "/v1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 2);

        let (_, body) = send(&app, Method::GET, "/v1/history", None).await;
        assert!(body["exchanges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = test_app(Arc::new(EchoGenerator), 10).await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
