// src/memory/abstraction.rs

//! Hierarchical abstraction: condenses mature clusters into higher-level
//! summary fragments and links members to their new parent.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::memory::config::MemoryConfig;
use crate::memory::quantizer;
use crate::memory::traits::{
    ClusterStore, EmbeddingProvider, FragmentStore, SimilarityIndex, Summarizer,
};
use crate::memory::types::{
    AbstractionReport, IndexMetadata, MemoryCluster, MemoryFragment,
};

pub struct AbstractionEngine {
    config: MemoryConfig,
    fragments: Arc<dyn FragmentStore>,
    clusters: Arc<dyn ClusterStore>,
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn Summarizer>,
    cancel: CancellationToken,
}

impl AbstractionEngine {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        clusters: Arc<dyn ClusterStore>,
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            fragments,
            clusters,
            index,
            embedder,
            summarizer,
            cancel,
        }
    }

    /// One abstraction pass over mature clusters. A failure on one cluster
    /// is recorded in the report and never aborts the others.
    pub async fn run(&self) -> anyhow::Result<AbstractionReport> {
        let mature = self
            .clusters
            .find_mature(2, self.config.cluster_stability_secs)
            .await?;

        let mut report = AbstractionReport {
            clusters_evaluated: mature.len(),
            ..Default::default()
        };

        if mature.is_empty() {
            debug!("abstraction: no mature clusters, skipping pass");
            return Ok(report);
        }

        info!(clusters = mature.len(), "abstraction: starting pass");

        for cluster in &mature {
            if self.cancel.is_cancelled() {
                info!("abstraction: cancelled mid-pass");
                break;
            }

            match self.abstract_cluster(cluster, &mut report).await {
                Ok(created) => {
                    if created {
                        report.abstractions_created += 1;
                    }
                }
                Err(err) => {
                    error!(
                        cluster_id = %cluster.cluster_id,
                        "abstraction: failed for cluster: {err:#}"
                    );
                    report.failed_clusters.push(cluster.cluster_id.clone());
                }
            }
        }

        info!(
            created = report.abstractions_created,
            failed = report.failed_clusters.len(),
            "abstraction: pass complete"
        );
        Ok(report)
    }

    /// Returns Ok(true) when a new abstraction was created, Ok(false) when
    /// the cluster was skipped by one of the gate conditions.
    async fn abstract_cluster(
        &self,
        cluster: &MemoryCluster,
        report: &mut AbstractionReport,
    ) -> anyhow::Result<bool> {
        let members = self.fragments.find_by_cluster(&cluster.cluster_id).await?;

        // The abstraction itself carries the same cluster id, so a repeat
        // pass sees it here and backs off.
        if members.iter().any(|m| m.is_abstraction()) {
            debug!(cluster_id = %cluster.cluster_id, "abstraction: already abstracted, skipping");
            report.skipped_existing += 1;
            return Ok(false);
        }

        if members.len() < 2 {
            debug!(
                cluster_id = %cluster.cluster_id,
                members = members.len(),
                "abstraction: too few members, skipping"
            );
            report.skipped_too_small += 1;
            return Ok(false);
        }

        if members
            .iter()
            .any(|m| m.abstraction_level >= self.config.max_abstraction_level)
        {
            debug!(cluster_id = %cluster.cluster_id, "abstraction: member at max level, skipping");
            report.skipped_max_level += 1;
            return Ok(false);
        }

        let combined = members
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let summary = self.summarizer.summarize(&combined).await?;

        let importance = compute_importance(&members);
        // One level above the deepest member, so the max-level guard
        // genuinely bounds hierarchy depth.
        let level = members
            .iter()
            .map(|m| m.abstraction_level)
            .max()
            .unwrap_or(1)
            + 1;

        let embedding = self.embedder.embed(&summary).await?;
        let quantized = quantizer::quantize(&embedding);

        let now = Utc::now();
        let fragment = MemoryFragment {
            id: None,
            text: summary,
            embedding: Some(embedding.clone()),
            quantized,
            abstraction_level: level,
            importance: Some(importance),
            cluster_id: Some(cluster.cluster_id.clone()),
            created_at: now,
            last_accessed: now,
            access_count: 0,
            parent_id: None,
        };
        let saved = self.fragments.create(&fragment).await?;
        let parent_id = saved
            .id
            .ok_or_else(|| anyhow::anyhow!("store returned abstraction without id"))?;

        for member in &members {
            if let Some(member_id) = member.id {
                self.fragments.set_parent(member_id, parent_id).await?;
            }
        }

        self.index
            .add(
                parent_id,
                &embedding,
                &saved.text,
                IndexMetadata {
                    abstraction_level: saved.abstraction_level,
                    importance: saved.importance,
                    cluster_id: saved.cluster_id.clone(),
                    created_at: saved.created_at,
                    last_accessed: saved.last_accessed,
                    access_count: saved.access_count,
                    kind: "abstraction",
                },
            )
            .await?;

        info!(
            cluster_id = %cluster.cluster_id,
            fragment_id = parent_id,
            level,
            importance,
            members = members.len(),
            "abstraction: created"
        );
        Ok(true)
    }
}

/// Importance of an abstraction: a 0.6 baseline (abstractions start above
/// raw content), plus rewards for cluster size, inherited importance, and
/// member usage, capped at 1.0.
pub fn compute_importance(members: &[MemoryFragment]) -> f32 {
    if members.is_empty() {
        return 0.5;
    }

    let size_score = (members.len() as f32 * 0.05).min(0.3);

    let avg_importance = members
        .iter()
        .map(|m| m.importance.unwrap_or(0.5))
        .sum::<f32>()
        / members.len() as f32;

    let avg_access = members.iter().map(|m| m.access_count as f32).sum::<f32>()
        / members.len() as f32;
    let access_bonus = (avg_access * 0.05).min(0.2);

    (0.6 + size_score + avg_importance * 0.2 + access_bonus).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn member(importance: f32, access_count: i64) -> MemoryFragment {
        let now = Utc::now();
        MemoryFragment {
            id: Some(1),
            text: "t".to_string(),
            embedding: None,
            quantized: 0,
            abstraction_level: 1,
            importance: Some(importance),
            cluster_id: Some("c".to_string()),
            created_at: now,
            last_accessed: now,
            access_count,
            parent_id: None,
        }
    }

    #[test]
    fn importance_of_small_untouched_cluster() {
        // 2 members: 0.6 + 0.1 + 0.5*0.2 + 0 = 0.8
        let members = vec![member(0.5, 0), member(0.5, 0)];
        let score = compute_importance(&members);
        assert!((score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn size_bonus_caps_at_point_three() {
        // 10 members would give 0.5 uncapped
        let members: Vec<_> = (0..10).map(|_| member(0.0, 0)).collect();
        let score = compute_importance(&members);
        assert!((score - 0.9).abs() < 1e-6); // 0.6 + 0.3 + 0.0 + 0.0
    }

    #[test]
    fn access_bonus_caps_at_point_two() {
        let members = vec![member(0.0, 100), member(0.0, 100)];
        let score = compute_importance(&members);
        // 0.6 + 0.1 + 0.0 + 0.2 = 0.9
        assert!((score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn importance_never_exceeds_one() {
        let members: Vec<_> = (0..20).map(|_| member(1.0, 50)).collect();
        assert_eq!(compute_importance(&members), 1.0);
    }

    #[test]
    fn missing_member_importance_defaults_to_half() {
        let mut m = member(0.0, 0);
        m.importance = None;
        let members = vec![m, member(0.5, 0)];
        // avg importance 0.5 -> 0.6 + 0.1 + 0.1 = 0.8
        assert!((compute_importance(&members) - 0.8).abs() < 1e-6);
    }
}
