// src/memory/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Primary record for persisted memory items: either original conversational
/// content (abstraction level 1) or an AI-generated summary of a cluster
/// (level > 1). Parent/child links are stored as ids, never as owning
/// references; the inverse relation is resolved through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub id: Option<i64>,                 // DB ID, assigned on create
    pub text: String,                    // Original text or generated summary
    pub embedding: Option<Vec<f32>>,     // Dense vector, set once at creation
    pub quantized: i8,                   // Single-byte lossy archive of the embedding
    pub abstraction_level: i32,          // 1 = original, >1 = summary-of-summaries
    pub importance: Option<f32>,         // [0,1]; read by ranking and eviction
    pub cluster_id: Option<String>,      // Null until clustering assigns one
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,    // Bumped on every retrieval
    pub access_count: i64,               // Bumped on every retrieval
    pub parent_id: Option<i64>,          // Abstraction that summarizes this fragment
}

impl MemoryFragment {
    /// Creates a level-1 fragment from raw conversational text.
    pub fn original(text: String, embedding: Vec<f32>, quantized: i8) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            text,
            embedding: Some(embedding),
            quantized,
            abstraction_level: 1,
            importance: Some(0.5),
            cluster_id: None,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            parent_id: None,
        }
    }

    pub fn is_abstraction(&self) -> bool {
        self.abstraction_level > 1
    }

    /// Text normalized for duplicate detection.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// A named group of mutually similar fragments. Created by the cluster
/// builder, read (never mutated) by the abstraction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCluster {
    pub cluster_id: String,
    pub prototype: Vec<f32>,             // Element-wise mean of member embeddings
    pub theme: String,                   // Short human-readable label
    pub member_count: i64,
    pub last_updated: DateTime<Utc>,
}

impl MemoryCluster {
    /// Maturity gates abstraction eligibility: enough members, and stable
    /// for longer than the configured window.
    pub fn is_mature(&self, min_members: i64, stable_for_secs: i64, now: DateTime<Utc>) -> bool {
        self.member_count >= min_members
            && (now - self.last_updated).num_seconds() > stable_for_secs
    }
}

/// A fragment paired with its final retrieval score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFragment {
    pub fragment: MemoryFragment,
    pub score: f32,
}

/// One match from the similarity index.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: i64,
    pub text: String,
    pub score: f32,
    pub metadata: IndexMetadata,
}

/// Metadata carried alongside each indexed vector.
#[derive(Debug, Clone, Serialize)]
pub struct IndexMetadata {
    pub abstraction_level: i32,
    pub importance: Option<f32>,
    pub cluster_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    pub kind: &'static str, // "original" | "abstraction"
}

/// Outcome of one clustering pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusteringReport {
    pub unclustered_found: usize,
    pub clusters_formed: usize,
    pub noise_fragments: usize,
    pub members_assigned: usize,
    pub missing_embeddings: usize,
}

/// Outcome of one abstraction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AbstractionReport {
    pub clusters_evaluated: usize,
    pub abstractions_created: usize,
    pub skipped_existing: usize,
    pub skipped_too_small: usize,
    pub skipped_max_level: usize,
    pub failed_clusters: Vec<String>,
}

/// Which cleanup strategy ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStrategy {
    Minimal,
    Aggressive,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub strategy: CleanupStrategy,
    pub initial_count: usize,
    pub final_count: usize,
    pub removed: usize,
    pub stale_originals: usize,
    pub condensed_originals: usize,
    pub duplicate_abstractions: usize,
    pub orphans: usize,
    pub stale_abstractions: usize,
    pub capacity_evictions: usize,
}

/// Per-cluster line in the status report.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub theme: String,
    pub member_count: i64,
    pub last_updated: DateTime<Utc>,
    pub mature: bool,
}

/// Snapshot of the clustering subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub total_clusters: usize,
    pub mature_clusters: usize,
    pub clusters: Vec<ClusterSummary>,
}

/// Snapshot of store usage and cleanup configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStats {
    pub total_fragments: usize,
    pub original_fragments: usize,
    pub abstracted_fragments: usize,
    pub recently_accessed: usize, // last 7 days
    pub avg_importance: f32,
    pub capacity: usize,
    pub days_to_keep_original: i64,
    pub days_to_keep_abstracted: i64,
    pub min_access_to_preserve: i64,
    pub min_importance_to_preserve: f32,
}
