// src/memory/clustering/builder.rs

//! Periodic clustering pass: partitions unclustered fragments into semantic
//! clusters with DBSCAN over cosine distance, then persists cluster records
//! with a prototype vector and theme.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::memory::clustering::dbscan::DensityClusterer;
use crate::memory::clustering::distance::cosine_distance;
use crate::memory::clustering::theme::derive_theme;
use crate::memory::config::MemoryConfig;
use crate::memory::traits::{ClusterStore, FragmentStore};
use crate::memory::types::{ClusteringReport, MemoryCluster, MemoryFragment};

pub struct ClusterBuilder {
    config: MemoryConfig,
    fragments: Arc<dyn FragmentStore>,
    clusters: Arc<dyn ClusterStore>,
}

impl ClusterBuilder {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        clusters: Arc<dyn ClusterStore>,
    ) -> Self {
        Self {
            config,
            fragments,
            clusters,
        }
    }

    /// One clustering pass over the unclustered pool.
    ///
    /// Noise fragments keep `cluster_id = NULL` and are reconsidered on the
    /// next run; already-clustered fragments are never re-submitted, so the
    /// unclustered pool only shrinks between ingestions.
    pub async fn run(&self) -> anyhow::Result<ClusteringReport> {
        let unclustered = self.fragments.find_unclustered().await?;

        let mut report = ClusteringReport {
            unclustered_found: unclustered.len(),
            ..Default::default()
        };

        if unclustered.is_empty() {
            debug!("clustering: no unclustered fragments, skipping pass");
            return Ok(report);
        }

        report.missing_embeddings = unclustered
            .iter()
            .filter(|f| f.embedding.is_none())
            .count();
        info!(
            total = unclustered.len(),
            missing_embeddings = report.missing_embeddings,
            eps = self.config.cluster_eps,
            min_pts = self.config.cluster_min_pts,
            "clustering: starting pass"
        );

        let clusterer =
            DensityClusterer::new(self.config.cluster_eps, self.config.cluster_min_pts);
        let groups = clusterer.cluster(&unclustered, |a, b| {
            cosine_distance(a.embedding.as_deref(), b.embedding.as_deref())
        });

        for group in &groups {
            if group.noise {
                report.noise_fragments += group.len();
                debug!(count = group.len(), "clustering: leaving noise unclustered");
                continue;
            }

            let cluster_id = Uuid::new_v4().to_string();
            let members: Vec<&MemoryFragment> =
                group.members.iter().map(|&i| &unclustered[i]).collect();

            for member in &members {
                if let Some(id) = member.id {
                    self.fragments.assign_cluster(id, &cluster_id).await?;
                } else {
                    warn!("clustering: member without id, cannot assign cluster");
                }
            }

            let prototype = compute_centroid(&members, self.config.embedding_dim);
            let texts: Vec<&str> = members.iter().map(|m| m.text.as_str()).collect();
            let theme = derive_theme(&texts);

            let cluster = MemoryCluster {
                cluster_id: cluster_id.clone(),
                prototype,
                theme: theme.clone(),
                member_count: members.len() as i64,
                last_updated: Utc::now(),
            };
            self.clusters.upsert(&cluster).await?;

            report.clusters_formed += 1;
            report.members_assigned += members.len();
            info!(
                cluster_id = %cluster_id,
                members = members.len(),
                theme = %theme,
                "clustering: formed cluster"
            );
        }

        info!(
            formed = report.clusters_formed,
            assigned = report.members_assigned,
            noise = report.noise_fragments,
            "clustering: pass complete"
        );
        Ok(report)
    }
}

/// Element-wise mean of member embeddings.
///
/// A member without an embedding (or with an off-dimension one) contributes
/// nothing to the sum, but the divisor stays the full member count.
fn compute_centroid(members: &[&MemoryFragment], dimensions: usize) -> Vec<f32> {
    if members.is_empty() {
        return Vec::new();
    }

    let dims = members
        .iter()
        .find_map(|m| m.embedding.as_ref().map(|e| e.len()))
        .unwrap_or(dimensions);
    let mut centroid = vec![0.0f32; dims];

    for member in members {
        if let Some(embedding) = &member.embedding {
            if embedding.len() == dims {
                for (slot, value) in centroid.iter_mut().zip(embedding.iter()) {
                    *slot += value;
                }
            }
        }
    }

    let count = members.len() as f32;
    for slot in centroid.iter_mut() {
        *slot /= count;
    }

    centroid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fragment_with(embedding: Option<Vec<f32>>) -> MemoryFragment {
        let now = Utc::now();
        MemoryFragment {
            id: Some(1),
            text: "t".to_string(),
            embedding,
            quantized: 0,
            abstraction_level: 1,
            importance: Some(0.5),
            cluster_id: None,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            parent_id: None,
        }
    }

    #[test]
    fn centroid_is_the_elementwise_mean() {
        let a = fragment_with(Some(vec![1.0, 0.0]));
        let b = fragment_with(Some(vec![0.0, 1.0]));
        let centroid = compute_centroid(&[&a, &b], 2);
        assert!((centroid[0] - 0.5).abs() < 1e-6);
        assert!((centroid[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_embedding_still_divides_by_full_member_count() {
        let a = fragment_with(Some(vec![3.0, 3.0]));
        let b = fragment_with(None);
        let c = fragment_with(Some(vec![3.0, 0.0]));
        let centroid = compute_centroid(&[&a, &b, &c], 2);
        // Sum is (6, 3), divided by 3 members (not 2 contributors)
        assert!((centroid[0] - 2.0).abs() < 1e-6);
        assert!((centroid[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn centroid_of_empty_member_list_is_empty() {
        assert!(compute_centroid(&[], 384).is_empty());
    }
}
