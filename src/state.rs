// src/state.rs

//! Shared application state: wires concrete stores, clients, and the memory
//! service together behind the trait seams.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::EngramConfig;
use crate::llm::{EmbeddingClient, SummaryClient};
use crate::memory::config::MemoryConfig;
use crate::memory::service::MemoryService;
use crate::memory::storage::qdrant::QdrantIndex;
use crate::memory::storage::sqlite::SqliteMemoryStore;
use crate::memory::traits::{
    ClusterStore, EmbeddingProvider, FragmentStore, SimilarityIndex, Summarizer,
};

pub struct AppState {
    pub memory_service: Arc<MemoryService>,
    pub cancel: CancellationToken,
}

/// Builds the full production wiring: SQLite stores, Qdrant index, and the
/// OpenAI-compatible embedding/summarization clients.
pub async fn create_app_state(
    config: &EngramConfig,
    pool: sqlx::SqlitePool,
) -> Result<AppState> {
    let store = Arc::new(SqliteMemoryStore::new(pool));
    store.run_migrations().await?;

    let index = Arc::new(QdrantIndex::new(
        reqwest::Client::new(),
        config.qdrant_url.clone(),
        config.qdrant_collection.clone(),
        config.embedding_dim,
    ));
    index.ensure_collection().await?;

    let embedder = Arc::new(EmbeddingClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dim,
    ));
    let summarizer = Arc::new(SummaryClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.summary_model.clone(),
        config.summary_max_tokens,
    ));

    let cancel = CancellationToken::new();
    let memory_service = Arc::new(MemoryService::new(
        MemoryConfig::from_config(config),
        store.clone() as Arc<dyn FragmentStore>,
        store as Arc<dyn ClusterStore>,
        index as Arc<dyn SimilarityIndex>,
        embedder as Arc<dyn EmbeddingProvider>,
        summarizer as Arc<dyn Summarizer>,
        cancel.clone(),
    ));

    Ok(AppState {
        memory_service,
        cancel,
    })
}
