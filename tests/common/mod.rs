// tests/common/mod.rs
// Shared test doubles and setup helpers for the engine integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;

use engram::memory::clustering::cosine_similarity;
use engram::memory::config::MemoryConfig;
use engram::memory::service::MemoryService;
use engram::memory::storage::sqlite::SqliteMemoryStore;
use engram::memory::traits::{
    ClusterStore, EmbeddingProvider, FragmentStore, SimilarityIndex, Summarizer,
};
use engram::memory::types::{IndexMatch, IndexMetadata};

pub const TEST_DIM: usize = 4;

/// Engine tunables for tests: tight eps, tiny capacity, no stability wait.
pub fn test_config() -> MemoryConfig {
    MemoryConfig {
        embedding_dim: TEST_DIM,
        cluster_eps: 0.3,
        cluster_min_pts: 2,
        cluster_stability_secs: 0,
        max_total_fragments: 5,
        ..MemoryConfig::default()
    }
}

/// Deterministic embedder: explicit per-text vectors with a hash-derived
/// fallback so unknown text never panics.
pub struct MockEmbedder {
    dim: usize,
    fail: bool,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            fail: false,
            vectors: Mutex::new(HashMap::new()),
        }
    }

    /// Embedder whose every call fails, for error-propagation tests.
    pub fn failing(dim: usize) -> Self {
        Self {
            dim,
            fail: true,
            vectors: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
    }

    fn fallback(&self, text: &str) -> Vec<f32> {
        let mut x: u64 = 0x9E3779B97F4A7C15;
        for b in text.bytes() {
            x = x.wrapping_add(b as u64).wrapping_mul(6364136223846793005);
        }
        (0..self.dim)
            .map(|_| {
                x = x
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((x >> 33) as f32 / u32::MAX as f32) - 0.5
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.fail {
            return Err(anyhow!("embedding service unavailable"));
        }
        let known = self.vectors.lock().unwrap().get(text).cloned();
        Ok(known.unwrap_or_else(|| self.fallback(text)))
    }
}

/// Summarizer returning a fixed string, or failing on demand.
pub struct MockSummarizer {
    summary: String,
    fail: bool,
}

impl MockSummarizer {
    pub fn fixed(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            summary: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _text: &str) -> anyhow::Result<String> {
        if self.fail {
            return Err(anyhow!("summarization service unavailable"));
        }
        Ok(self.summary.clone())
    }
}

struct IndexEntry {
    vector: Vec<f32>,
    text: String,
    metadata: IndexMetadata,
}

/// Brute-force in-memory similarity index.
pub struct InMemoryIndex {
    entries: Mutex<HashMap<i64, IndexEntry>>,
    fail_removes: bool,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fail_removes: false,
        }
    }

    /// Index whose removals always error, for at-least-once deletion tests.
    pub fn with_failing_removes() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fail_removes: true,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn add(
        &self,
        id: i64,
        vector: &[f32],
        text: &str,
        metadata: IndexMetadata,
    ) -> anyhow::Result<()> {
        self.entries.lock().unwrap().insert(
            id,
            IndexEntry {
                vector: vector.to_vec(),
                text: text.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> anyhow::Result<Vec<IndexMatch>> {
        let entries = self.entries.lock().unwrap();
        let mut matches: Vec<IndexMatch> = entries
            .iter()
            .map(|(id, entry)| IndexMatch {
                id: *id,
                text: entry.text.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        matches.truncate(max_results);
        Ok(matches)
    }

    async fn remove(&self, id: i64) -> anyhow::Result<()> {
        if self.fail_removes {
            return Err(anyhow!("index unavailable"));
        }
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Fresh in-memory SQLite store with migrations applied.
pub async fn setup_store() -> Arc<SqliteMemoryStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    let store = SqliteMemoryStore::new(pool);
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

/// Full engine wired against test doubles. Returns the service plus handles
/// to the store, index, and embedder for direct inspection.
pub async fn setup_engine(
    config: MemoryConfig,
    embedder: MockEmbedder,
    summarizer: MockSummarizer,
) -> (
    MemoryService,
    Arc<SqliteMemoryStore>,
    Arc<InMemoryIndex>,
    Arc<MockEmbedder>,
) {
    let index = Arc::new(InMemoryIndex::new());
    let embedder = Arc::new(embedder);
    let (service, store) =
        setup_engine_with_index(config, embedder.clone(), summarizer, index.clone()).await;
    (service, store, index, embedder)
}

/// Same wiring with a caller-provided index (e.g. one whose removals fail).
pub async fn setup_engine_with_index(
    config: MemoryConfig,
    embedder: Arc<MockEmbedder>,
    summarizer: MockSummarizer,
    index: Arc<InMemoryIndex>,
) -> (MemoryService, Arc<SqliteMemoryStore>) {
    let store = setup_store().await;

    let service = MemoryService::new(
        config,
        store.clone() as Arc<dyn FragmentStore>,
        store.clone() as Arc<dyn ClusterStore>,
        index as Arc<dyn SimilarityIndex>,
        embedder as Arc<dyn EmbeddingProvider>,
        Arc::new(summarizer) as Arc<dyn Summarizer>,
        CancellationToken::new(),
    );

    (service, store)
}
