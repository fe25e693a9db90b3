// src/memory/storage/sqlite/store.rs
//! Implements FragmentStore and ClusterStore for SQLite.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::memory::traits::{ClusterStore, FragmentStore};
use crate::memory::types::{MemoryCluster, MemoryFragment};

pub struct SqliteMemoryStore {
    pub pool: SqlitePool,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        super::migration::run_migrations(&self.pool).await
    }

    // Vec<f32> <-> BLOB, little-endian f32s
    fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_fragment(row: &SqliteRow) -> MemoryFragment {
        let embedding = row
            .get::<Option<Vec<u8>>, _>("embedding")
            .map(|blob| Self::blob_to_vector(&blob));
        let created_at: NaiveDateTime = row.get("created_at");
        let last_accessed: NaiveDateTime = row.get("last_accessed");

        MemoryFragment {
            id: Some(row.get::<i64, _>("id")),
            text: row.get("text"),
            embedding,
            quantized: row.get::<i64, _>("quantized") as i8,
            abstraction_level: row.get::<i64, _>("abstraction_level") as i32,
            importance: row.get("importance"),
            cluster_id: row.get("cluster_id"),
            created_at: Utc.from_utc_datetime(&created_at),
            last_accessed: Utc.from_utc_datetime(&last_accessed),
            access_count: row.get("access_count"),
            parent_id: row.get("parent_id"),
        }
    }

    async fn fetch_fragments<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<MemoryFragment>> {
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_fragment).collect())
    }
}

const FRAGMENT_COLUMNS: &str = "id, text, embedding, quantized, abstraction_level, importance, \
     cluster_id, created_at, last_accessed, access_count, parent_id";

#[async_trait]
impl FragmentStore for SqliteMemoryStore {
    async fn create(&self, fragment: &MemoryFragment) -> Result<MemoryFragment> {
        let row = sqlx::query(
            r#"
            INSERT INTO memory_fragments (
                text, embedding, quantized, abstraction_level, importance,
                cluster_id, created_at, last_accessed, access_count, parent_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&fragment.text)
        .bind(fragment.embedding.as_ref().map(|e| Self::vector_to_blob(e)))
        .bind(fragment.quantized as i64)
        .bind(fragment.abstraction_level as i64)
        .bind(fragment.importance)
        .bind(&fragment.cluster_id)
        .bind(fragment.created_at.naive_utc())
        .bind(fragment.last_accessed.naive_utc())
        .bind(fragment.access_count)
        .bind(fragment.parent_id)
        .fetch_one(&self.pool)
        .await?;

        let mut saved = fragment.clone();
        saved.id = Some(row.get("id"));
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MemoryFragment>> {
        let row = sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_fragment))
    }

    async fn list_all(&self) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments ORDER BY id"
        )))
        .await
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_fragments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn find_unclustered(&self) -> Result<Vec<MemoryFragment>> {
        // Insertion order gives clustering its canonical iteration order.
        self.fetch_fragments(sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments \
             WHERE cluster_id IS NULL AND abstraction_level = 1 ORDER BY id"
        )))
        .await
    }

    async fn find_by_cluster(&self, cluster_id: &str) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(
            sqlx::query(&format!(
                "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments WHERE cluster_id = ? ORDER BY id"
            ))
            .bind(cluster_id.to_string()),
        )
        .await
    }

    async fn find_abstractions(&self) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments WHERE abstraction_level > 1 ORDER BY id"
        )))
        .await
    }

    async fn find_stale_originals(
        &self,
        cutoff: DateTime<Utc>,
        max_access: i64,
    ) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(
            sqlx::query(&format!(
                "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments \
                 WHERE abstraction_level = 1 AND created_at < ? AND access_count < ? ORDER BY id"
            ))
            .bind(cutoff.naive_utc())
            .bind(max_access),
        )
        .await
    }

    async fn find_stale_abstractions(
        &self,
        cutoff: DateTime<Utc>,
        max_access: i64,
        max_importance: f32,
    ) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(
            sqlx::query(&format!(
                "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments \
                 WHERE abstraction_level > 1 AND created_at < ? \
                   AND access_count < ? AND importance < ? ORDER BY id"
            ))
            .bind(cutoff.naive_utc())
            .bind(max_access)
            .bind(max_importance),
        )
        .await
    }

    async fn find_with_parent(&self) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments WHERE parent_id IS NOT NULL ORDER BY id"
        )))
        .await
    }

    async fn find_orphaned(&self) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(sqlx::query(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments \
             WHERE parent_id IS NOT NULL \
               AND parent_id NOT IN (SELECT id FROM memory_fragments) ORDER BY id"
        )))
        .await
    }

    async fn find_children(&self, parent_id: i64) -> Result<Vec<MemoryFragment>> {
        self.fetch_fragments(
            sqlx::query(&format!(
                "SELECT {FRAGMENT_COLUMNS} FROM memory_fragments WHERE parent_id = ? ORDER BY id"
            ))
            .bind(parent_id),
        )
        .await
    }

    async fn assign_cluster(&self, id: i64, cluster_id: &str) -> Result<()> {
        sqlx::query("UPDATE memory_fragments SET cluster_id = ? WHERE id = ?")
            .bind(cluster_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_parent(&self, id: i64, parent_id: i64) -> Result<()> {
        sqlx::query("UPDATE memory_fragments SET parent_id = ? WHERE id = ?")
            .bind(parent_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE memory_fragments \
             SET access_count = access_count + 1, last_accessed = ? WHERE id = ?",
        )
        .bind(at.naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM memory_fragments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for SqliteMemoryStore {
    async fn upsert(&self, cluster: &MemoryCluster) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memory_clusters (cluster_id, prototype, theme, member_count, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cluster_id) DO UPDATE SET
                prototype = excluded.prototype,
                theme = excluded.theme,
                member_count = excluded.member_count,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&cluster.cluster_id)
        .bind(Self::vector_to_blob(&cluster.prototype))
        .bind(&cluster.theme)
        .bind(cluster.member_count)
        .bind(cluster.last_updated.naive_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, cluster_id: &str) -> Result<Option<MemoryCluster>> {
        let row = sqlx::query(
            "SELECT cluster_id, prototype, theme, member_count, last_updated \
             FROM memory_clusters WHERE cluster_id = ?",
        )
        .bind(cluster_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_cluster))
    }

    async fn list_all(&self) -> Result<Vec<MemoryCluster>> {
        let rows = sqlx::query(
            "SELECT cluster_id, prototype, theme, member_count, last_updated \
             FROM memory_clusters ORDER BY last_updated DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_cluster).collect())
    }

    async fn find_mature(
        &self,
        min_members: i64,
        stable_for_secs: i64,
    ) -> Result<Vec<MemoryCluster>> {
        let cutoff = Utc::now() - Duration::seconds(stable_for_secs);
        let rows = sqlx::query(
            "SELECT cluster_id, prototype, theme, member_count, last_updated \
             FROM memory_clusters WHERE member_count >= ? AND last_updated < ?",
        )
        .bind(min_members)
        .bind(cutoff.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_cluster).collect())
    }
}

fn row_to_cluster(row: &SqliteRow) -> MemoryCluster {
    let prototype_blob: Vec<u8> = row.get("prototype");
    let last_updated: NaiveDateTime = row.get("last_updated");

    MemoryCluster {
        cluster_id: row.get("cluster_id"),
        prototype: SqliteMemoryStore::blob_to_vector(&prototype_blob),
        theme: row.get("theme"),
        member_count: row.get("member_count"),
        last_updated: Utc.from_utc_datetime(&last_updated),
    }
}
