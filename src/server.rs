//! HTTP API for resume search.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Liveness check |
//! | `POST` | `/api/search` | Search resumes by free text |
//! | `POST` | `/api/resume-matching/match-resumes` | Rank resumes against a job description |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `provider_unavailable` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! on another port can call the API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::PipelineError;
use crate::index::{AzureSearchIndex, SearchIndex};
use crate::models::{SearchHit, SearchMode};
use crate::search::search;

/// Shortest job description the matching endpoint accepts, in characters.
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
/// Largest `topResults` the matching endpoint accepts.
pub const MAX_MATCH_RESULTS: usize = 20;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SearchIndex>,
    default_top: usize,
    default_mode: SearchMode,
}

impl AppState {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            embedder,
            index,
            default_top: 5,
            default_mode: SearchMode::default(),
        }
    }

    pub fn with_defaults(mut self, top: usize, mode: SearchMode) -> Self {
        self.default_top = top;
        self.default_mode = mode;
        self
    }
}

/// Build the router with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/search", post(handle_search))
        .route("/api/resume-matching/match-resumes", post(handle_match))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("The search API requires embeddings. Set [embedding] provider in config.");
    }
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
    let index: Arc<dyn SearchIndex> =
        Arc::new(AzureSearchIndex::new(&config.index, &config.embedding)?);
    let state = AppState::new(embedder, index)
        .with_defaults(config.search.default_top, config.search.default_mode);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, index = %config.index.name, "search API listening");
    println!("Search API listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(_) | PipelineError::EmptyInput => {
                bad_request(err.to_string())
            }
            PipelineError::ProviderUnavailable(_) | PipelineError::Rejected { .. } => {
                warn!(error = %err, "upstream failure while searching");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "provider_unavailable",
                    message: err.to_string(),
                }
            }
            PipelineError::DimensionMismatch { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: err.to_string(),
            },
        }
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Resume search API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /api/search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    top: Option<usize>,
    #[serde(default)]
    mode: Option<SearchMode>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(body) = body?;
    if body.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = search(
        state.embedder.as_ref(),
        state.index.as_ref(),
        &body.query,
        body.top.unwrap_or(state.default_top),
        body.mode.unwrap_or(state.default_mode),
    )
    .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /api/resume-matching/match-resumes ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchBody {
    #[serde(default)]
    job_description: Option<String>,
    #[serde(default)]
    matching_options: MatchingOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchingOptions {
    #[serde(default = "default_true")]
    use_hybrid_search: bool,
    #[serde(default = "default_top_results")]
    top_results: usize,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            use_hybrid_search: true,
            top_results: default_top_results(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_top_results() -> usize {
    5
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchedResume {
    resume_id: String,
    candidate_name: String,
    search_score: f64,
    semantic_score: f64,
}

async fn handle_match(
    State(state): State<AppState>,
    body: Result<Json<MatchBody>, JsonRejection>,
) -> Result<Json<Vec<MatchedResume>>, AppError> {
    let Json(body) = body?;
    let job_description = body
        .job_description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| bad_request("jobDescription is required"))?;
    if job_description.chars().count() < MIN_JOB_DESCRIPTION_CHARS {
        return Err(bad_request(format!(
            "jobDescription must be at least {} characters",
            MIN_JOB_DESCRIPTION_CHARS
        )));
    }

    let options = body.matching_options;
    if !(1..=MAX_MATCH_RESULTS).contains(&options.top_results) {
        return Err(bad_request(format!(
            "topResults must be between 1 and {}",
            MAX_MATCH_RESULTS
        )));
    }
    let mode = if options.use_hybrid_search {
        SearchMode::Hybrid
    } else {
        SearchMode::Vector
    };

    let hits = search(
        state.embedder.as_ref(),
        state.index.as_ref(),
        &job_description,
        options.top_results,
        mode,
    )
    .await?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| MatchedResume {
                resume_id: hit.id,
                candidate_name: hit.name,
                search_score: hit.score,
                semantic_score: hit.semantic_score,
            })
            .collect(),
    ))
}
