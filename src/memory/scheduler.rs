// src/memory/scheduler.rs
//! Background schedulers for the periodic engine jobs.
//!
//! Each job is an independent spawned loop with its own interval; the engine
//! itself assumes nothing about scheduling, so every job can also be fired
//! manually through the service seams.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::memory::service::MemoryService;

/// Spawn the clustering loop (unclustered fragments -> semantic clusters).
pub fn spawn_clustering_scheduler(
    service: Arc<MemoryService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match service.run_clustering().await {
                Ok(report) => {
                    if report.clusters_formed > 0 {
                        info!(
                            formed = report.clusters_formed,
                            assigned = report.members_assigned,
                            "scheduled clustering pass"
                        );
                    }
                }
                Err(err) => warn!("scheduled clustering pass failed: {err:#}"),
            }
        }
    })
}

/// Spawn the abstraction loop (mature clusters -> summary fragments).
pub fn spawn_abstraction_scheduler(
    service: Arc<MemoryService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match service.run_abstraction().await {
                Ok(report) => {
                    if report.abstractions_created > 0 {
                        info!(
                            created = report.abstractions_created,
                            "scheduled abstraction pass"
                        );
                    }
                }
                Err(err) => warn!("scheduled abstraction pass failed: {err:#}"),
            }
        }
    })
}

/// Spawn the cleanup loop (capacity-aware eviction).
pub fn spawn_cleanup_scheduler(
    service: Arc<MemoryService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match service.run_cleanup().await {
                Ok(report) => info!(
                    strategy = ?report.strategy,
                    removed = report.removed,
                    remaining = report.final_count,
                    "scheduled cleanup pass"
                ),
                Err(err) => warn!("scheduled cleanup pass failed: {err:#}"),
            }
        }
    })
}
