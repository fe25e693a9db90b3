// src/memory/storage/qdrant/store.rs
//! Implements SimilarityIndex for Qdrant over its REST API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;

use crate::memory::traits::SimilarityIndex;
use crate::memory::types::{IndexMatch, IndexMetadata};

pub struct QdrantIndex {
    pub client: Client,
    pub base_url: String,
    pub collection: String,
    pub vector_size: usize,
}

impl QdrantIndex {
    pub fn new<S: Into<String>>(client: Client, base_url: S, collection: S, vector_size: usize) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            collection: collection.into(),
            vector_size,
        }
    }

    /// Ensures the collection exists with the configured vector size.
    /// Safe to call multiple times; only creates if missing.
    pub async fn ensure_collection(&self) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let resp = self.client.get(&url).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let req_body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let resp = self.client.put(&url).json(&req_body).send().await?;
        let status = resp.status();
        let err_body = resp.text().await.unwrap_or_default();
        if status.is_success() || status.as_u16() == 409 || err_body.contains("already exists") {
            Ok(())
        } else {
            Err(anyhow!("Failed to create Qdrant collection: {}", err_body))
        }
    }
}

#[async_trait]
impl SimilarityIndex for QdrantIndex {
    async fn add(
        &self,
        id: i64,
        vector: &[f32],
        text: &str,
        metadata: IndexMetadata,
    ) -> Result<()> {
        let url = format!("{}/collections/{}/points", self.base_url, self.collection);

        let payload = json!({
            "text": text,
            "abstraction_level": metadata.abstraction_level,
            "importance": metadata.importance,
            "cluster_id": metadata.cluster_id,
            "created_at": metadata.created_at.timestamp_millis(),
            "last_accessed": metadata.last_accessed.timestamp_millis(),
            "access_count": metadata.access_count,
            "type": metadata.kind,
        });

        let req_body = json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": payload,
            }]
        });

        let resp = self
            .client
            .put(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| anyhow!("Qdrant add error: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "Qdrant add failed: {}",
                resp.text().await.unwrap_or_default()
            ));
        }

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> Result<Vec<IndexMatch>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let req_body = json!({
            "vector": vector,
            "limit": max_results,
            "score_threshold": min_score,
            "with_payload": true,
        });

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| anyhow!("Qdrant search error: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "Qdrant search failed: {}",
                resp.text().await.unwrap_or_default()
            ));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        let mut matches = Vec::new();

        if let Some(points) = resp_json.get("result").and_then(|r| r.as_array()) {
            for point in points {
                let Some(id) = point.get("id").and_then(|id| id.as_i64()) else {
                    continue;
                };
                let score = point.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
                let payload = point.get("payload").cloned().unwrap_or(json!({}));

                matches.push(IndexMatch {
                    id,
                    score,
                    text: payload
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    metadata: IndexMetadata {
                        abstraction_level: payload
                            .get("abstraction_level")
                            .and_then(|v| v.as_i64())
                            .unwrap_or(1) as i32,
                        importance: payload
                            .get("importance")
                            .and_then(|v| v.as_f64())
                            .map(|f| f as f32),
                        cluster_id: payload
                            .get("cluster_id")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string()),
                        created_at: millis_to_datetime(
                            payload.get("created_at").and_then(|v| v.as_i64()),
                        ),
                        last_accessed: millis_to_datetime(
                            payload.get("last_accessed").and_then(|v| v.as_i64()),
                        ),
                        access_count: payload
                            .get("access_count")
                            .and_then(|v| v.as_i64())
                            .unwrap_or(0),
                        kind: match payload.get("type").and_then(|v| v.as_str()) {
                            Some("abstraction") => "abstraction",
                            _ => "original",
                        },
                    },
                });
            }
        }

        Ok(matches)
    }

    async fn remove(&self, id: i64) -> Result<()> {
        let url = format!(
            "{}/collections/{}/points/delete",
            self.base_url, self.collection
        );

        let req_body = json!({ "points": [id] });

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| anyhow!("Qdrant delete error: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "Qdrant delete failed: {}",
                resp.text().await.unwrap_or_default()
            ));
        }

        Ok(())
    }
}

fn millis_to_datetime(ms: Option<i64>) -> DateTime<Utc> {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}
