// src/memory/pipeline.rs

//! Ingestion pipeline: raw text -> embedding -> quantization -> persistence
//! -> similarity index.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::memory::config::MemoryConfig;
use crate::memory::error::MemoryError;
use crate::memory::quantizer;
use crate::memory::traits::{EmbeddingProvider, FragmentStore, SimilarityIndex};
use crate::memory::types::{IndexMetadata, MemoryFragment};

pub struct IngestionPipeline {
    config: MemoryConfig,
    fragments: Arc<dyn FragmentStore>,
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(
        config: MemoryConfig,
        fragments: Arc<dyn FragmentStore>,
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            fragments,
            index,
            embedder,
        }
    }

    /// Embeds, quantizes, persists, and indexes one piece of conversational
    /// text. Returns the new fragment id.
    pub async fn ingest(&self, text: &str) -> anyhow::Result<i64> {
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("cannot ingest empty text"));
        }

        debug!(chars = text.len(), "ingest: embedding text");
        let embedding = self.embedder.embed(text).await?;

        // A wrong-sized vector means the deployed model does not match the
        // configured dimension; refuse before persisting anything.
        if embedding.len() != self.config.embedding_dim {
            return Err(MemoryError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual: embedding.len(),
            }
            .into());
        }

        let quantized = quantizer::quantize(&embedding);
        debug!(quantized, "ingest: quantized embedding");

        let fragment = MemoryFragment::original(text.to_string(), embedding.clone(), quantized);
        let saved = self.fragments.create(&fragment).await?;
        let id = saved
            .id
            .ok_or_else(|| anyhow!("store returned fragment without id"))?;

        self.index
            .add(
                id,
                &embedding,
                text,
                IndexMetadata {
                    abstraction_level: saved.abstraction_level,
                    importance: saved.importance,
                    cluster_id: saved.cluster_id.clone(),
                    created_at: saved.created_at,
                    last_accessed: saved.last_accessed,
                    access_count: saved.access_count,
                    kind: "original",
                },
            )
            .await?;

        info!(id, "ingest: fragment persisted and indexed");
        Ok(id)
    }
}
