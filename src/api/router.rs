// src/api/router.rs

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::memory;
use crate::state::AppState;

pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/memory/store", post(memory::store_memory))
        .route("/memory/retrieve", get(memory::retrieve_memories))
        .route("/memory/search", get(memory::search_memories))
        .route("/memory/context", get(memory::memory_context))
        .route("/memory/clusters/status", get(memory::clusters_status))
        .route("/memory/clustering/run", post(memory::run_clustering))
        .route("/memory/abstraction/run", post(memory::run_abstraction))
        .route("/memory/cleanup/manual", post(memory::manual_cleanup))
        .route("/memory/cleanup/stats", get(memory::cleanup_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
