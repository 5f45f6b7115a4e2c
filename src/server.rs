//! HTTP JSON API (`rag serve`).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/stats` | Transcript and vector store statistics |
//! | `POST` | `/search` | `{query, n_results?}` → nearest chunks |
//! | `POST` | `/chat` | `{query, n_results?}` → answer with context |
//! | `POST` | `/setup` | `{rebuild?}` → build or refresh the vector store |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502, OpenAI key,
//! quota or availability problems), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::chatbot::RagChatbot;
use crate::models::{ChatResponse, SearchHit, SetupReport, StoreInfo, TranscriptSummary};
use crate::openai::is_upstream;
use crate::progress::NoProgress;

#[derive(Clone)]
struct AppState {
    chatbot: Arc<RagChatbot>,
    /// Serializes `/setup` calls.
    setup_lock: Arc<Mutex<()>>,
}

/// Build the API router around a chatbot.
pub fn router(chatbot: Arc<RagChatbot>) -> Router {
    let state = AppState {
        chatbot,
        setup_lock: Arc::new(Mutex::new(())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/search", post(handle_search))
        .route("/chat", post(handle_chat))
        .route("/setup", post(handle_setup))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `bind` until the process is terminated.
pub async fn run_server(chatbot: RagChatbot, bind: &str) -> anyhow::Result<()> {
    if !chatbot.can_chat() {
        tracing::warn!("OPENAI_API_KEY is not set; /chat will return upstream_error");
    }

    let app = router(Arc::new(chatbot));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("RAG server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if is_upstream(&err) {
            tracing::warn!(%message, "upstream failure");
            AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error".to_string(),
                message,
            }
        } else {
            tracing::error!(%message, "request failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message,
            }
        }
    }
}

fn validate_query(query: &str, n_results: Option<usize>, default_n: usize) -> Result<usize, AppError> {
    if query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    match n_results {
        Some(0) => Err(bad_request("n_results must be >= 1")),
        Some(n) => Ok(n),
        None => Ok(default_n),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chat_enabled: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chat_enabled: state.chatbot.can_chat(),
    })
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    transcripts: TranscriptSummary,
    vector_store: StoreInfo,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let transcripts = state.chatbot.transcript_summary().await?;
    let vector_store = state.chatbot.vector_store_info().await?;
    Ok(Json(StatsResponse {
        transcripts,
        vector_store,
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    n_results: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let n = validate_query(
        &req.query,
        req.n_results,
        state.chatbot.config().retrieval.n_results,
    )?;
    let results = state.chatbot.search_transcripts(&req.query, n).await?;
    tracing::info!(query = %req.query, hits = results.len(), "search");
    Ok(Json(SearchResponse {
        query: req.query.trim().to_string(),
        results,
    }))
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let n = validate_query(
        &req.query,
        req.n_results,
        state.chatbot.config().retrieval.n_results,
    )?;
    let response = state.chatbot.chat(&req.query, n).await?;
    tracing::info!(query = %req.query, sources = response.sources.len(), "chat");
    Ok(Json(response))
}

// ============ POST /setup ============

#[derive(Deserialize, Default)]
struct SetupRequest {
    #[serde(default)]
    rebuild: bool,
}

async fn handle_setup(
    State(state): State<AppState>,
    body: Option<Json<SetupRequest>>,
) -> Result<Json<SetupReport>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let _guard = state.setup_lock.lock().await;
    let report = state
        .chatbot
        .setup_vector_store(req.rebuild, &NoProgress)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("  ", None, 5).is_err());
        assert!(validate_query("q", Some(0), 5).is_err());
        assert_eq!(validate_query("q", None, 5).ok(), Some(5));
        assert_eq!(validate_query("q", Some(2), 5).ok(), Some(2));
    }

    #[test]
    fn test_upstream_maps_to_bad_gateway() {
        let err: anyhow::Error =
            crate::openai::UpstreamError::new("OpenAI API quota exhausted").into();
        let app_err = AppError::from(err.context("Failed to generate a response"));
        assert_eq!(app_err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(app_err.code, "upstream_error");
        assert!(app_err.message.contains("quota exhausted"));

        let other = AppError::from(anyhow::anyhow!("disk full"));
        assert_eq!(other.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.code, "internal");
    }
}
