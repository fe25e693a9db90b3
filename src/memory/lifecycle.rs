// src/memory/lifecycle.rs

//! Capacity-aware eviction. Layered heuristics (age, access, importance,
//! duplication, orphaning) do the considerate work; an unconditional
//! importance-floor pass guarantees the store ends under capacity.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::memory::config::MemoryConfig;
use crate::memory::traits::{FragmentStore, SimilarityIndex};
use crate::memory::types::{CleanupReport, CleanupStats, CleanupStrategy, MemoryFragment};

pub struct LifecycleManager {
    config: MemoryConfig,
    fragments: Arc<dyn FragmentStore>,
    index: Arc<dyn SimilarityIndex>,
    cancel: CancellationToken,
}

impl LifecycleManager {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        index: Arc<dyn SimilarityIndex>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            fragments,
            index,
            cancel,
        }
    }

    /// One cleanup pass. Strategy selection is shared by the scheduled and
    /// manual triggers: within capacity runs the minimal path, over capacity
    /// runs the aggressive one.
    pub async fn run(&self) -> anyhow::Result<CleanupReport> {
        let initial_count = self.fragments.count().await?;
        info!(fragments = initial_count, "cleanup: starting pass");

        let strategy = if initial_count <= self.config.max_total_fragments {
            CleanupStrategy::Minimal
        } else {
            CleanupStrategy::Aggressive
        };

        let mut report = CleanupReport {
            strategy,
            initial_count,
            final_count: initial_count,
            removed: 0,
            stale_originals: 0,
            condensed_originals: 0,
            duplicate_abstractions: 0,
            orphans: 0,
            stale_abstractions: 0,
            capacity_evictions: 0,
        };

        match strategy {
            CleanupStrategy::Minimal => {
                report.stale_originals = self.remove_stale_originals().await?;
                report.orphans = self.remove_orphans().await?;
                report.duplicate_abstractions = self.remove_duplicate_abstractions().await?;
            }
            CleanupStrategy::Aggressive => {
                report.stale_originals = self.remove_stale_originals().await?;
                report.condensed_originals = self.remove_condensed_originals().await?;
                report.duplicate_abstractions = self.remove_duplicate_abstractions().await?;
                report.orphans = self.remove_orphans().await?;
                report.stale_abstractions = self.remove_stale_abstractions().await?;
                // Consolidating near-duplicate abstractions by semantic
                // similarity is an extension point; the floor pass below is
                // the correctness guarantee.
                report.capacity_evictions = self.enforce_capacity().await?;
            }
        }

        report.final_count = self.fragments.count().await?;
        report.removed = report.initial_count.saturating_sub(report.final_count);

        info!(
            strategy = ?report.strategy,
            removed = report.removed,
            remaining = report.final_count,
            "cleanup: pass complete"
        );
        Ok(report)
    }

    /// Usage snapshot for monitoring.
    pub async fn stats(&self) -> anyhow::Result<CleanupStats> {
        let all = self.fragments.list_all().await?;
        let week_ago = Utc::now() - Duration::days(7);

        let original_fragments = all.iter().filter(|f| f.abstraction_level == 1).count();
        let abstracted_fragments = all.iter().filter(|f| f.is_abstraction()).count();
        let recently_accessed = all.iter().filter(|f| f.last_accessed > week_ago).count();
        let avg_importance = if all.is_empty() {
            0.5
        } else {
            all.iter().map(|f| f.importance.unwrap_or(0.5)).sum::<f32>() / all.len() as f32
        };

        Ok(CleanupStats {
            total_fragments: all.len(),
            original_fragments,
            abstracted_fragments,
            recently_accessed,
            avg_importance,
            capacity: self.config.max_total_fragments,
            days_to_keep_original: self.config.days_to_keep_original,
            days_to_keep_abstracted: self.config.days_to_keep_abstracted,
            min_access_to_preserve: self.config.min_access_to_preserve,
            min_importance_to_preserve: self.config.min_importance_to_preserve,
        })
    }

    /// Originals past the retention window with too few accesses.
    async fn remove_stale_originals(&self) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - Duration::days(self.config.days_to_keep_original);
        let stale = self
            .fragments
            .find_stale_originals(cutoff, self.config.min_access_to_preserve)
            .await?;

        debug!(count = stale.len(), "cleanup: stale originals");
        self.delete_batch(&stale).await
    }

    /// Originals already condensed into a live parent abstraction, kept only
    /// when either their access count or importance earns preservation.
    async fn remove_condensed_originals(&self) -> anyhow::Result<usize> {
        let with_parent = self.fragments.find_with_parent().await?;
        debug!(count = with_parent.len(), "cleanup: fragments with parents");

        let mut removed = 0;
        for fragment in &with_parent {
            if self.cancel.is_cancelled() {
                info!("cleanup: cancelled mid-pass");
                break;
            }

            if fragment.access_count >= self.config.min_access_to_preserve
                || fragment.importance.unwrap_or(0.5) >= self.config.min_importance_to_preserve
            {
                continue;
            }

            // Dangling parents are the orphan pass's job, not this one's.
            let parent_alive = match fragment.parent_id {
                Some(parent_id) => self.fragments.find_by_id(parent_id).await?.is_some(),
                None => false,
            };
            if !parent_alive {
                continue;
            }

            if self.delete_everywhere(fragment).await {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Within each group of abstractions sharing normalized text, only the
    /// most recently accessed survives.
    async fn remove_duplicate_abstractions(&self) -> anyhow::Result<usize> {
        let abstractions = self.fragments.find_abstractions().await?;
        debug!(count = abstractions.len(), "cleanup: abstractions to dedupe");

        let mut groups: HashMap<String, Vec<MemoryFragment>> = HashMap::new();
        for fragment in abstractions {
            groups
                .entry(fragment.normalized_text())
                .or_default()
                .push(fragment);
        }

        let mut removed = 0;
        for (_, mut group) in groups {
            if group.len() <= 1 {
                continue;
            }
            group.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
            for duplicate in &group[1..] {
                if self.delete_everywhere(duplicate).await {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// Fragments whose parent reference points at a row that no longer
    /// exists.
    async fn remove_orphans(&self) -> anyhow::Result<usize> {
        let orphans = self.fragments.find_orphaned().await?;
        debug!(count = orphans.len(), "cleanup: orphaned fragments");
        self.delete_batch(&orphans).await
    }

    /// Abstractions past the longer retention window and below both
    /// preserve thresholds.
    async fn remove_stale_abstractions(&self) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - Duration::days(self.config.days_to_keep_abstracted);
        let stale = self
            .fragments
            .find_stale_abstractions(
                cutoff,
                self.config.min_access_to_preserve,
                self.config.min_importance_to_preserve,
            )
            .await?;

        debug!(count = stale.len(), "cleanup: stale abstractions");
        self.delete_batch(&stale).await
    }

    /// Unconditional backstop: when the heuristics left the store over
    /// capacity, evict the lowest-importance fragments until the count fits.
    async fn enforce_capacity(&self) -> anyhow::Result<usize> {
        let count = self.fragments.count().await?;
        if count <= self.config.max_total_fragments {
            debug!("cleanup: within capacity, skipping importance floor");
            return Ok(0);
        }

        let mut all = self.fragments.list_all().await?;
        all.sort_by(|a, b| {
            let ia = a.importance.unwrap_or(0.0);
            let ib = b.importance.unwrap_or(0.0);
            ia.partial_cmp(&ib).unwrap_or(std::cmp::Ordering::Equal)
        });

        let excess = count - self.config.max_total_fragments;
        warn!(excess, "cleanup: enforcing capacity via importance floor");

        let targets: Vec<MemoryFragment> = all.into_iter().take(excess).collect();
        self.delete_batch(&targets).await
    }

    async fn delete_batch(&self, fragments: &[MemoryFragment]) -> anyhow::Result<usize> {
        let mut removed = 0;
        for fragment in fragments {
            if self.cancel.is_cancelled() {
                info!("cleanup: cancelled mid-pass");
                break;
            }
            if self.delete_everywhere(fragment).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes a fragment from the similarity index and the durable store.
    /// At-least-once, not transactional: a failure on one side is logged and
    /// must not block the other. Returns true when the store row went away.
    async fn delete_everywhere(&self, fragment: &MemoryFragment) -> bool {
        let Some(id) = fragment.id else {
            warn!("cleanup: fragment without id, skipping delete");
            return false;
        };

        if let Err(err) = self.index.remove(id).await {
            error!(id, "cleanup: failed to remove from similarity index: {err:#}");
        }

        match self.fragments.delete(id).await {
            Ok(()) => {
                debug!(id, "cleanup: removed fragment");
                true
            }
            Err(err) => {
                error!(id, "cleanup: failed to remove from store: {err:#}");
                false
            }
        }
    }
}
