// src/memory/config.rs

use crate::config::EngramConfig;

/// Engine tunables, decoupled from the process-wide env config so tests and
/// embedders can construct them directly.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Embedding dimension every stored vector must match.
    pub embedding_dim: usize,

    /// DBSCAN neighbor radius (cosine distance). Corpus-dependent.
    pub cluster_eps: f64,
    /// DBSCAN minimum neighborhood size to seed a cluster.
    pub cluster_min_pts: usize,
    /// A cluster must sit unchanged this long before abstraction considers it.
    pub cluster_stability_secs: i64,

    /// Upper bound on abstraction-of-abstraction depth.
    pub max_abstraction_level: i32,

    /// Clusters below this prototype similarity are ignored during retrieval.
    pub min_cluster_similarity: f32,
    /// Results scoring below this are dropped from retrieval output.
    pub min_total_score: f32,

    /// Fragment ceiling; exceeding it switches cleanup to the aggressive path.
    pub max_total_fragments: usize,
    pub days_to_keep_original: i64,
    pub days_to_keep_abstracted: i64,
    pub min_access_to_preserve: i64,
    pub min_importance_to_preserve: f32,
}

impl MemoryConfig {
    pub fn from_config(config: &EngramConfig) -> Self {
        Self {
            embedding_dim: config.embedding_dim,
            cluster_eps: config.cluster_eps,
            cluster_min_pts: config.cluster_min_pts,
            cluster_stability_secs: config.cluster_stability_secs,
            max_abstraction_level: config.max_abstraction_level,
            min_cluster_similarity: config.min_cluster_similarity,
            min_total_score: config.min_total_score,
            max_total_fragments: config.max_total_fragments,
            days_to_keep_original: config.days_to_keep_original,
            days_to_keep_abstracted: config.days_to_keep_abstracted,
            min_access_to_preserve: config.min_access_to_preserve,
            min_importance_to_preserve: config.min_importance_to_preserve,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            cluster_eps: 0.814,
            cluster_min_pts: 2,
            cluster_stability_secs: 3600,
            max_abstraction_level: 5,
            min_cluster_similarity: 0.6,
            min_total_score: 0.3,
            max_total_fragments: 10000,
            days_to_keep_original: 30,
            days_to_keep_abstracted: 90,
            min_access_to_preserve: 3,
            min_importance_to_preserve: 0.7,
        }
    }
}
