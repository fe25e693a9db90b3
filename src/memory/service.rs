// src/memory/service.rs

//! Public API and orchestration for the memory engine. These methods are the
//! only seams the HTTP layer (or any other caller) needs.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::memory::abstraction::AbstractionEngine;
use crate::memory::clustering::ClusterBuilder;
use crate::memory::config::MemoryConfig;
use crate::memory::lifecycle::LifecycleManager;
use crate::memory::pipeline::IngestionPipeline;
use crate::memory::retrieval::{self, RetrievalRanker};
use crate::memory::traits::{
    ClusterStore, EmbeddingProvider, FragmentStore, SimilarityIndex, Summarizer,
};
use crate::memory::types::{
    AbstractionReport, CleanupReport, CleanupStats, ClusterStatus, ClusterSummary,
    ClusteringReport, ScoredFragment,
};

pub struct MemoryService {
    config: MemoryConfig,
    clusters: Arc<dyn ClusterStore>,

    pipeline: IngestionPipeline,
    cluster_builder: ClusterBuilder,
    abstraction: AbstractionEngine,
    ranker: RetrievalRanker,
    lifecycle: LifecycleManager,
}

impl MemoryService {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        clusters: Arc<dyn ClusterStore>,
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
        cancel: CancellationToken,
    ) -> Self {
        info!("initializing memory service");

        let pipeline = IngestionPipeline::new(
            config.clone(),
            fragments.clone(),
            index.clone(),
            embedder.clone(),
        );
        let cluster_builder =
            ClusterBuilder::new(config.clone(), fragments.clone(), clusters.clone());
        let abstraction = AbstractionEngine::new(
            config.clone(),
            fragments.clone(),
            clusters.clone(),
            index.clone(),
            embedder.clone(),
            summarizer,
            cancel.clone(),
        );
        let ranker = RetrievalRanker::new(
            config.clone(),
            fragments.clone(),
            clusters.clone(),
            index.clone(),
            embedder,
        );
        let lifecycle = LifecycleManager::new(config.clone(), fragments, index, cancel);

        Self {
            config,
            clusters,
            pipeline,
            cluster_builder,
            abstraction,
            ranker,
            lifecycle,
        }
    }

    /// Stores one piece of conversational text as a new memory fragment.
    pub async fn ingest(&self, text: &str) -> anyhow::Result<i64> {
        self.pipeline.ingest(text).await
    }

    /// Ranked, deduplicated retrieval with access-tracking side effects.
    pub async fn retrieve(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ScoredFragment>> {
        self.ranker.retrieve(query, limit).await
    }

    /// Direct similarity search without cluster expansion.
    pub async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<ScoredFragment>> {
        self.ranker.search(query, max_results).await
    }

    /// Renders ranked results into a prompt-ready context block.
    pub async fn retrieve_context(&self, query: &str, limit: usize) -> anyhow::Result<String> {
        let results = self.retrieve(query, limit).await?;
        Ok(retrieval::render_context(&results))
    }

    /// One clustering pass over unclustered fragments.
    pub async fn run_clustering(&self) -> anyhow::Result<ClusteringReport> {
        self.cluster_builder.run().await
    }

    /// One abstraction pass over mature clusters.
    pub async fn run_abstraction(&self) -> anyhow::Result<AbstractionReport> {
        self.abstraction.run().await
    }

    /// One cleanup pass; strategy picked from current usage.
    pub async fn run_cleanup(&self) -> anyhow::Result<CleanupReport> {
        self.lifecycle.run().await
    }

    /// Snapshot of every cluster with its maturity assessment.
    pub async fn cluster_status(&self) -> anyhow::Result<ClusterStatus> {
        let all = self.clusters.list_all().await?;
        let now = Utc::now();

        let clusters: Vec<ClusterSummary> = all
            .iter()
            .map(|c| ClusterSummary {
                cluster_id: c.cluster_id.clone(),
                theme: c.theme.clone(),
                member_count: c.member_count,
                last_updated: c.last_updated,
                mature: c.is_mature(2, self.config.cluster_stability_secs, now),
            })
            .collect();

        let mature_clusters = clusters.iter().filter(|c| c.mature).count();

        Ok(ClusterStatus {
            total_clusters: clusters.len(),
            mature_clusters,
            clusters,
        })
    }

    /// Store usage and cleanup configuration snapshot.
    pub async fn cleanup_stats(&self) -> anyhow::Result<CleanupStats> {
        self.lifecycle.stats().await
    }
}
