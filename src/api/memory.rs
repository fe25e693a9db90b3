// src/api/memory.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    api::error::{ApiError, ApiResult, IntoApiError},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct StorePayload {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct StoredOk {
    ok: bool,
    id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    5
}

/// POST /memory/store
pub async fn store_memory(
    State(app): State<Arc<AppState>>,
    Json(payload): Json<StorePayload>,
) -> ApiResult<impl IntoResponse> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }

    let id = app
        .memory_service
        .ingest(&payload.text)
        .await
        .into_api_error("Failed to store memory")?;

    info!(%id, "stored memory fragment");
    Ok(Json(StoredOk { ok: true, id }))
}

/// GET /memory/retrieve?query=...&limit=5
pub async fn retrieve_memories(
    State(app): State<Arc<AppState>>,
    Query(params): Query<RetrieveParams>,
) -> ApiResult<impl IntoResponse> {
    let results = app
        .memory_service
        .retrieve(&params.query, params.limit)
        .await
        .into_api_error("Failed to retrieve memories")?;

    Ok(Json(results))
}

/// GET /memory/search?query=...&limit=5
pub async fn search_memories(
    State(app): State<Arc<AppState>>,
    Query(params): Query<RetrieveParams>,
) -> ApiResult<impl IntoResponse> {
    let results = app
        .memory_service
        .search(&params.query, params.limit)
        .await
        .into_api_error("Failed to search memories")?;

    Ok(Json(results))
}

/// GET /memory/context?query=...&limit=5
pub async fn memory_context(
    State(app): State<Arc<AppState>>,
    Query(params): Query<RetrieveParams>,
) -> ApiResult<impl IntoResponse> {
    let context = app
        .memory_service
        .retrieve_context(&params.query, params.limit)
        .await
        .into_api_error("Failed to build memory context")?;

    Ok(context)
}

/// GET /memory/clusters/status
pub async fn clusters_status(
    State(app): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let status = app
        .memory_service
        .cluster_status()
        .await
        .into_api_error("Failed to read cluster status")?;

    Ok(Json(status))
}

/// POST /memory/clustering/run
pub async fn run_clustering(
    State(app): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let report = app
        .memory_service
        .run_clustering()
        .await
        .into_api_error("Clustering pass failed")?;

    Ok(Json(report))
}

/// POST /memory/abstraction/run
pub async fn run_abstraction(
    State(app): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let report = app
        .memory_service
        .run_abstraction()
        .await
        .into_api_error("Abstraction pass failed")?;

    Ok(Json(report))
}

/// POST /memory/cleanup/manual
pub async fn manual_cleanup(
    State(app): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let report = app
        .memory_service
        .run_cleanup()
        .await
        .into_api_error("Cleanup pass failed")?;

    info!(removed = report.removed, "manual cleanup completed");
    Ok(Json(report))
}

/// GET /memory/cleanup/stats
pub async fn cleanup_stats(
    State(app): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let stats = app
        .memory_service
        .cleanup_stats()
        .await
        .into_api_error("Failed to read cleanup stats")?;

    Ok(Json(stats))
}
