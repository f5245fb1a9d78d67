//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Demo page with a question form |
//! | `GET`  | `/ask?question=...` | Retrieval-augmented answer with source previews |
//! | `GET`  | `/rag?question=...` | Alias of `/ask` |
//! | `GET`  | `/launches[?limit=N]` | Latest launch summary, or the N most recent raw records |
//! | `GET`  | `/health` | Health check (returns version and index state) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream_launch_data", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `corpus_unavailable`, `embedding_provider`,
//! `answer_provider`, `upstream_launch_data`, `configuration_mismatch`,
//! `internal` (all 500).

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::engine::RagEngine;
use crate::error::RagError;
use crate::launches::LaunchClient;
use crate::llm::create_answer_provider;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state handed to every handler through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
    pub launches: LaunchClient,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>, launches: LaunchClient) -> Self {
        Self { engine, launches }
    }

    /// Resolve providers from configuration and assemble the state.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let answerer = create_answer_provider(&config.llm)?;
        let engine = RagEngine::new(Arc::new(config.clone()), embedder, answerer);
        let launches = LaunchClient::new(&config.launches)?;
        Ok(Self::new(Arc::new(engine), launches))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_home))
        .route("/ask", get(handle_ask))
        .route("/rag", get(handle_ask))
        .route("/launches", get(handle_launches))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the server on `[server].bind` and run until Ctrl+C.
///
/// With `index.eager = true` the index is built before the listener binds, so
/// a broken corpus or provider stops startup instead of the first request.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;

    if config.index.eager {
        let index = state.engine.index().await?;
        info!(chunks = index.len(), "index ready");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
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

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(code = err.code(), error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET / ============

async fn handle_home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============ GET /ask ============

#[derive(Deserialize)]
struct AskParams {
    question: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    params: Result<Query<AskParams>, QueryRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let question = params
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("question must not be empty"))?;

    let result = state.engine.answer(&question).await?;
    let sources = state.engine.source_previews(&result);

    Ok(Json(AskResponse {
        answer: result.answer_text,
        sources,
    }))
}

// ============ GET /launches ============

#[derive(Deserialize)]
struct LaunchesParams {
    limit: Option<usize>,
}

async fn handle_launches(
    State(state): State<AppState>,
    params: Result<Query<LaunchesParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;

    let body = match params.limit {
        None => serde_json::to_value(state.launches.latest().await?)
            .map_err(|e| AppError::from(RagError::UpstreamLaunchData(e.to_string())))?,
        Some(0) => return Err(bad_request("limit must be >= 1")),
        Some(limit) => serde_json::Value::Array(state.launches.recent(limit).await?),
    };
    Ok(Json(body))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    index_ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        index_ready: state.engine.is_index_ready(),
    })
}
