// src/memory/traits.rs

//! Collaborator contracts for the memory engine. All storage, indexing, and
//! model calls go through these; no direct DB or HTTP calls in engine logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::memory::types::{IndexMatch, IndexMetadata, MemoryCluster, MemoryFragment};

/// Durable store for memory fragments plus the predicate queries the
/// engine's batch jobs need.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Persist a fragment and return it with its assigned id.
    async fn create(&self, fragment: &MemoryFragment) -> anyhow::Result<MemoryFragment>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<MemoryFragment>>;

    async fn list_all(&self) -> anyhow::Result<Vec<MemoryFragment>>;

    async fn count(&self) -> anyhow::Result<usize>;

    /// Level-1 fragments not yet assigned to any cluster, in insertion order.
    async fn find_unclustered(&self) -> anyhow::Result<Vec<MemoryFragment>>;

    async fn find_by_cluster(&self, cluster_id: &str) -> anyhow::Result<Vec<MemoryFragment>>;

    /// All fragments with abstraction level > 1.
    async fn find_abstractions(&self) -> anyhow::Result<Vec<MemoryFragment>>;

    /// Level-1 fragments created before `cutoff` with fewer than
    /// `max_access` recorded accesses.
    async fn find_stale_originals(
        &self,
        cutoff: DateTime<Utc>,
        max_access: i64,
    ) -> anyhow::Result<Vec<MemoryFragment>>;

    /// Abstractions created before `cutoff` that fall below both preserve
    /// thresholds.
    async fn find_stale_abstractions(
        &self,
        cutoff: DateTime<Utc>,
        max_access: i64,
        max_importance: f32,
    ) -> anyhow::Result<Vec<MemoryFragment>>;

    /// Fragments with a non-null parent reference.
    async fn find_with_parent(&self) -> anyhow::Result<Vec<MemoryFragment>>;

    /// Fragments whose parent reference points at a row that no longer exists.
    async fn find_orphaned(&self) -> anyhow::Result<Vec<MemoryFragment>>;

    /// Children of an abstraction (inverse of `parent_id`).
    async fn find_children(&self, parent_id: i64) -> anyhow::Result<Vec<MemoryFragment>>;

    async fn assign_cluster(&self, id: i64, cluster_id: &str) -> anyhow::Result<()>;

    async fn set_parent(&self, id: i64, parent_id: i64) -> anyhow::Result<()>;

    /// Bump access count and last-accessed timestamp. Returns false when the
    /// fragment vanished in the meantime (deleted by a concurrent cleanup),
    /// which callers treat as a non-fatal skip.
    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<bool>;

    async fn delete(&self, id: i64) -> anyhow::Result<()>;
}

/// Durable store for cluster records.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Insert or replace by cluster id.
    async fn upsert(&self, cluster: &MemoryCluster) -> anyhow::Result<()>;

    async fn find_by_id(&self, cluster_id: &str) -> anyhow::Result<Option<MemoryCluster>>;

    async fn list_all(&self) -> anyhow::Result<Vec<MemoryCluster>>;

    /// Clusters with at least `min_members` members whose last update is
    /// older than `stable_for_secs`.
    async fn find_mature(
        &self,
        min_members: i64,
        stable_for_secs: i64,
    ) -> anyhow::Result<Vec<MemoryCluster>>;
}

/// Vector similarity search over indexed fragments.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn add(
        &self,
        id: i64,
        vector: &[f32],
        text: &str,
        metadata: IndexMetadata,
    ) -> anyhow::Result<()>;

    async fn search(
        &self,
        vector: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> anyhow::Result<Vec<IndexMatch>>;

    async fn remove(&self, id: i64) -> anyhow::Result<()>;
}

/// Opaque text-to-vector function. D is fixed per deployment.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Opaque text condensation function (an LLM call in production).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> anyhow::Result<String>;
}
