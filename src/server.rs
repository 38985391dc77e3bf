//! HTTP API for the course assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question within a session |
//! | `GET`  | `/api/courses` | Course count and titles |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Internal errors are
//! logged with their full cause chain; the response carries only a
//! generic message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
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
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::rag::{CourseStats, RagSystem};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    rag: Arc<RagSystem>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// When `documents.ingest_on_startup` is set, the documents folder is
/// ingested before the listener is bound; a missing folder is logged and
/// skipped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let rag = Arc::new(RagSystem::from_config(config).await?);

    if config.documents.ingest_on_startup {
        let root = &config.documents.root;
        if root.is_dir() {
            let summary = rag.add_course_folder(root, false).await?;
            println!(
                "Loaded {} courses with {} chunks",
                summary.courses_added, summary.chunks_added
            );
        } else {
            warn!(folder = %root.display(), "documents folder not found, skipping startup ingest");
        }
    }

    let app = router(rag);
    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!(addr = %bind_addr, "server listening");
    println!("crag server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router over an existing [`RagSystem`].
pub fn router(rag: Arc<RagSystem>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { rag })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (`"bad_request"`, `"internal"`).
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

/// Log the fault and hide it behind a generic 500.
fn internal(context: &str, err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "{}", context);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{}; see server logs", context),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// Answer plus parallel source label/link arrays.
#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<String>,
    source_links: Vec<Option<String>>,
    session_id: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let session_id = match req.session_id.filter(|s| !s.trim().is_empty()) {
        Some(id) => id,
        None => state.rag.create_session(),
    };

    let result = state
        .rag
        .query(&req.query, Some(&session_id))
        .await
        .map_err(|e| internal("query failed", e))?;

    let (sources, source_links) = result
        .sources
        .into_iter()
        .map(|s| (s.label, s.link))
        .unzip();

    Ok(Json(QueryResponse {
        answer: result.answer,
        sources,
        source_links,
        session_id,
    }))
}

// ============ GET /api/courses ============

async fn handle_courses(State(state): State<AppState>) -> Result<Json<CourseStats>, AppError> {
    let stats = state
        .rag
        .course_stats()
        .await
        .map_err(|e| internal("failed to read course catalog", e))?;
    Ok(Json(stats))
}
