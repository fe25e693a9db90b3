// src/memory/storage/sqlite/migration.rs
//! Handles migrations for SQLite: ensures fragment and cluster tables match
//! the latest schema. Run at startup; idempotent.

use anyhow::Result;
use sqlx::{Executor, SqlitePool};

const CREATE_MEMORY_FRAGMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS memory_fragments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    embedding BLOB,
    quantized INTEGER NOT NULL DEFAULT 0,
    abstraction_level INTEGER NOT NULL DEFAULT 1,
    importance REAL,
    cluster_id TEXT,
    created_at DATETIME NOT NULL,
    last_accessed DATETIME NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER
);
"#;

const CREATE_MEMORY_CLUSTERS: &str = r#"
CREATE TABLE IF NOT EXISTS memory_clusters (
    cluster_id TEXT PRIMARY KEY,
    prototype BLOB NOT NULL,
    theme TEXT NOT NULL,
    member_count INTEGER NOT NULL,
    last_updated DATETIME NOT NULL
);
"#;

const CREATE_FRAGMENT_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fragments_cluster_id ON memory_fragments(cluster_id);
CREATE INDEX IF NOT EXISTS idx_fragments_level ON memory_fragments(abstraction_level);
CREATE INDEX IF NOT EXISTS idx_fragments_parent_id ON memory_fragments(parent_id);
CREATE INDEX IF NOT EXISTS idx_fragments_created_at ON memory_fragments(created_at);
"#;

/// Runs all required migrations for the SQLite backend.
/// Safe to call at every startup (idempotent).
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_MEMORY_FRAGMENTS).await?;
    pool.execute(CREATE_MEMORY_CLUSTERS).await?;
    pool.execute(CREATE_FRAGMENT_INDICES).await?;
    Ok(())
}
