// src/memory/retrieval.rs

//! Cluster-aware retrieval with composite relevance ranking.
//!
//! Candidates come from the clusters whose prototype is close to the query,
//! so fragments that are only loosely similar to the query can still surface
//! through a strongly matching cluster. Every returned fragment gets its
//! access statistics bumped, which feeds back into future ranking and makes
//! useful memories stickier against eviction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::memory::clustering::distance::cosine_similarity;
use crate::memory::config::MemoryConfig;
use crate::memory::traits::{ClusterStore, EmbeddingProvider, FragmentStore, SimilarityIndex};
use crate::memory::types::{IndexMatch, MemoryFragment, ScoredFragment};

/// Member similarity dominates, cluster similarity contributes.
const MEMBER_WEIGHT: f32 = 0.8;
const CLUSTER_WEIGHT: f32 = 0.2;

/// Blend between raw similarity and the relevance heuristics.
const BASE_WEIGHT: f32 = 0.6;
const RELEVANCE_WEIGHT: f32 = 0.4;

/// Clusters considered per query.
const TOP_CLUSTERS: usize = 3;

/// Candidate pool multiplier, leaving room for the filtering stage.
const CANDIDATE_MULTIPLIER: usize = 3;

/// Floor for the direct index search.
const DIRECT_SEARCH_MIN_SCORE: f32 = 0.5;

pub struct RetrievalRanker {
    config: MemoryConfig,
    fragments: Arc<dyn FragmentStore>,
    clusters: Arc<dyn ClusterStore>,
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

struct Candidate {
    fragment: MemoryFragment,
    base_score: f32,
}

impl RetrievalRanker {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        clusters: Arc<dyn ClusterStore>,
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            fragments,
            clusters,
            index,
            embedder,
        }
    }

    /// Ranked, deduplicated retrieval. An embedding failure propagates to
    /// the caller: an empty result always means "nothing relevant", never
    /// "the embedding call broke".
    pub async fn retrieve(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ScoredFragment>> {
        let query_embedding = self.embedder.embed(query).await?;

        let candidates = self
            .cluster_aware_candidates(&query_embedding, limit * CANDIDATE_MULTIPLIER)
            .await?;

        if candidates.is_empty() {
            debug!("retrieval: no candidates for query");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut scored: Vec<ScoredFragment> = candidates
            .into_iter()
            .map(|c| {
                let relevance = relevance_score(&c.fragment, now);
                let total = c.base_score * BASE_WEIGHT + relevance * RELEVANCE_WEIGHT;
                debug!(
                    base = c.base_score,
                    relevance,
                    total,
                    "retrieval: scored candidate"
                );
                ScoredFragment {
                    fragment: c.fragment,
                    score: total,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let results = self.filter_ranked(scored, limit);

        // Feedback loop: returned fragments become stickier. A fragment
        // deleted since scoring is a non-fatal skip.
        for result in &results {
            if let Some(id) = result.fragment.id {
                match self.fragments.record_access(id, now).await {
                    Ok(true) => {}
                    Ok(false) => debug!(id, "retrieval: fragment vanished before access bump"),
                    Err(err) => warn!(id, "retrieval: access bump failed: {err:#}"),
                }
            }
        }

        info!(count = results.len(), "retrieval: returning ranked results");
        Ok(results)
    }

    /// Direct similarity search against the index, bypassing cluster
    /// expansion and composite scoring. Matches whose fragment has vanished
    /// are skipped.
    pub async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<ScoredFragment>> {
        let query_embedding = self.embedder.embed(query).await?;

        let matches = self
            .index
            .search(&query_embedding, max_results, DIRECT_SEARCH_MIN_SCORE)
            .await?;
        debug!(count = matches.len(), "retrieval: direct index matches");

        let mut results = Vec::with_capacity(matches.len());
        for IndexMatch { id, score, .. } in matches {
            match self.fragments.find_by_id(id).await? {
                Some(fragment) => results.push(ScoredFragment { fragment, score }),
                None => debug!(id, "retrieval: indexed fragment no longer in store"),
            }
        }
        Ok(results)
    }

    /// Candidate generation: score every cluster prototype against the
    /// query, expand the top matches into their members, and boost member
    /// similarity by cluster similarity.
    async fn cluster_aware_candidates(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<Candidate>> {
        let all_clusters = self.clusters.list_all().await?;
        debug!(clusters = all_clusters.len(), "retrieval: evaluating clusters");

        let mut cluster_scores: Vec<(usize, f32)> = all_clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.prototype.is_empty())
            .map(|(i, c)| (i, cosine_similarity(query_embedding, &c.prototype)))
            .collect();
        cluster_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut seen_ids: HashSet<i64> = HashSet::new();

        for &(cluster_idx, cluster_similarity) in cluster_scores.iter().take(TOP_CLUSTERS) {
            if cluster_similarity < self.config.min_cluster_similarity {
                debug!(
                    cluster_id = %all_clusters[cluster_idx].cluster_id,
                    similarity = cluster_similarity,
                    "retrieval: cluster below similarity gate"
                );
                continue;
            }

            let cluster = &all_clusters[cluster_idx];
            let members = self.fragments.find_by_cluster(&cluster.cluster_id).await?;
            debug!(
                cluster_id = %cluster.cluster_id,
                similarity = cluster_similarity,
                members = members.len(),
                "retrieval: expanding cluster"
            );

            for member in members {
                let Some(id) = member.id else { continue };
                if seen_ids.contains(&id) {
                    continue;
                }
                // A member without an embedding cannot be scored, but must
                // not fail the whole call.
                let Some(embedding) = member.embedding.as_deref() else {
                    continue;
                };

                let member_similarity = cosine_similarity(query_embedding, embedding);
                let boosted =
                    member_similarity * MEMBER_WEIGHT + cluster_similarity * CLUSTER_WEIGHT;

                seen_ids.insert(id);
                candidates.push(Candidate {
                    fragment: member,
                    base_score: boosted,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.base_score
                .partial_cmp(&a.base_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }

    /// Walks the ranked list dropping text duplicates and sub-threshold
    /// scores until `limit` results are accepted.
    fn filter_ranked(&self, scored: Vec<ScoredFragment>, limit: usize) -> Vec<ScoredFragment> {
        let mut results: Vec<ScoredFragment> = Vec::new();
        let mut seen_text: HashSet<String> = HashSet::new();

        for item in scored {
            if results.len() >= limit {
                break;
            }

            let key = item.fragment.normalized_text();
            if seen_text.contains(&key) {
                debug!("retrieval: skipping duplicate content");
                continue;
            }

            if item.score < self.config.min_total_score {
                debug!(score = item.score, "retrieval: skipping low-relevance result");
                continue;
            }

            seen_text.insert(key);
            results.push(item);
        }

        results
    }
}

/// Relevance heuristics layered on top of raw similarity:
/// recency (exponential decay over hours since last access), an access-count
/// boost capped at 0.2, and an importance term centered on 0.5 that can go
/// negative for low-importance fragments.
pub fn relevance_score(fragment: &MemoryFragment, now: DateTime<Utc>) -> f32 {
    recency_score(fragment.last_accessed, now)
        + access_boost(fragment.access_count)
        + importance_boost(fragment.importance)
}

fn recency_score(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let hours_ago = (now - last_accessed).num_hours() as f32;
    // Drops to ~0.05 after 24 hours, ~0.01 after 48
    0.15 * (-hours_ago / 24.0).exp()
}

fn access_boost(access_count: i64) -> f32 {
    (access_count as f32 * 0.02).min(0.2)
}

fn importance_boost(importance: Option<f32>) -> f32 {
    (importance.unwrap_or(0.5) - 0.5) * 0.1
}

/// Renders ranked fragments into a plain-text context block for prompting.
pub fn render_context(results: &[ScoredFragment]) -> String {
    if results.is_empty() {
        return "No relevant memories found.".to_string();
    }

    let mut context = String::from("Relevant memories:\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!("{}. {}\n", i + 1, result.fragment.text));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fragment(access_count: i64, importance: Option<f32>, hours_old: i64) -> MemoryFragment {
        let now = Utc::now();
        MemoryFragment {
            id: Some(1),
            text: "t".to_string(),
            embedding: None,
            quantized: 0,
            abstraction_level: 1,
            importance,
            cluster_id: None,
            created_at: now - Duration::hours(hours_old),
            last_accessed: now - Duration::hours(hours_old),
            access_count,
            parent_id: None,
        }
    }

    #[test]
    fn fresh_fragment_gets_full_recency() {
        let now = Utc::now();
        let f = fragment(0, Some(0.5), 0);
        let score = relevance_score(&f, now);
        // recency 0.15, no boosts
        assert!((score - 0.15).abs() < 1e-3);
    }

    #[test]
    fn recency_decays_exponentially() {
        let now = Utc::now();
        let day_old = fragment(0, Some(0.5), 24);
        let score = relevance_score(&day_old, now);
        // 0.15 * e^-1 ~= 0.0552
        assert!((score - 0.0552).abs() < 1e-3);
    }

    #[test]
    fn access_boost_caps_at_point_two() {
        assert!((access_boost(5) - 0.1).abs() < 1e-6);
        assert_eq!(access_boost(100), 0.2);
    }

    #[test]
    fn importance_boost_is_negative_below_half() {
        assert!(importance_boost(Some(0.2)) < 0.0);
        assert!(importance_boost(Some(0.9)) > 0.0);
        assert_eq!(importance_boost(None), 0.0);
    }

    #[test]
    fn scoring_is_a_pure_function_of_state() {
        let now = Utc::now();
        let f = fragment(3, Some(0.8), 12);
        assert_eq!(relevance_score(&f, now), relevance_score(&f, now));
    }

    #[test]
    fn context_rendering_numbers_results() {
        let results = vec![
            ScoredFragment {
                fragment: {
                    let mut f = fragment(0, None, 0);
                    f.text = "first memory".to_string();
                    f
                },
                score: 0.9,
            },
            ScoredFragment {
                fragment: {
                    let mut f = fragment(0, None, 0);
                    f.text = "second memory".to_string();
                    f
                },
                score: 0.8,
            },
        ];
        let context = render_context(&results);
        assert!(context.starts_with("Relevant memories:\n1. first memory"));
        assert!(context.contains("2. second memory"));
    }

    #[test]
    fn empty_results_render_fixed_sentence() {
        assert_eq!(render_context(&[]), "No relevant memories found.");
    }
}
