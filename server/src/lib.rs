use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hadith_core::{EngineError, EngineStats, HighlightedDocument, ScoredDocument, SearchEngine, SearchFilters};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
    pub limit: Option<usize>,
    pub collection: Option<String>,
    pub grade: Option<String>,
    pub fuzzy: Option<u8>,
}

impl SearchParams {
    fn filters(&self) -> SearchFilters {
        SearchFilters { collection: self.collection.clone(), grade: self.grade.clone(), fuzzy: self.fuzzy }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub admin_token: Option<String>,
}

/// Engine failures mapped onto HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Unauthorized(&'static str),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self { ApiError::Engine(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Engine(EngineError::NotFound { .. }) => (StatusCode::NOT_FOUND, Json(serde_json::json!({}))).into_response(),
            ApiError::Engine(EngineError::InvalidQuery(_)) => (StatusCode::OK, Json(serde_json::json!([]))).into_response(),
            ApiError::Engine(e @ (EngineError::IndexUnavailable(_) | EngineError::DataUnavailable { .. })) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Engine(e @ EngineError::Config(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": msg }))).into_response(),
        }
    }
}

pub fn build_app(engine: Arc<SearchEngine>) -> Router {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState { engine, admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", get(search_handler))
        .route("/api/v2/search", get(search_advanced_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/:collection_id/:book/:book_ref_no", get(lookup_handler))
        .route("/admin/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run an engine call on the blocking pool; the first call may build the index.
async fn with_engine<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SearchEngine) -> Result<T, EngineError> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let start = std::time::Instant::now();
    let filters = params.filters();
    let query = params.search;
    let limit = params.limit;
    let results = with_engine(&state, move |engine| engine.search(&query, limit, &filters)).await?;
    tracing::debug!(hits = results.len(), took_ms = start.elapsed().as_millis() as u64, "search");
    Ok(Json(results))
}

pub async fn search_advanced_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<HighlightedDocument>>, ApiError> {
    let start = std::time::Instant::now();
    let filters = params.filters();
    let query = params.search;
    let limit = params.limit;
    let results = with_engine(&state, move |engine| engine.search_advanced(&query, limit, &filters)).await?;
    tracing::debug!(hits = results.len(), took_ms = start.elapsed().as_millis() as u64, "advanced search");
    Ok(Json(results))
}

pub async fn lookup_handler(
    State(state): State<AppState>,
    Path((collection_id, book, book_ref_no)): Path<(String, String, String)>,
) -> Result<Json<hadith_core::Document>, ApiError> {
    let doc = with_engine(&state, move |engine| engine.lookup(&collection_id, &book, &book_ref_no)).await?;
    Ok(Json(doc))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.stats())
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let generation = with_engine(&state, |engine| engine.rebuild()).await?;
    tracing::info!(generation, "index rebuilt on request");
    Ok(Json(serde_json::json!({ "generation": generation })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token"))
    }
}
