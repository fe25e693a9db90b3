// src/llm/embeddings.rs
// Text embedding generation against an OpenAI-compatible embeddings endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::memory::traits::EmbeddingProvider;

/// A client for generating text embeddings.
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl EmbeddingClient {
    pub fn new(base_url: String, api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
            dimensions,
        }
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimensions,
        });

        debug!(
            chars = text.len(),
            model = %self.model,
            "requesting embedding"
        );

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(anyhow!("Embedding API error ({}): {}", status, error_text));
        }

        let result: EmbeddingResponse = response.json().await?;

        let first = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding data in API response"))?;

        Ok(first.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embedding(text).await
    }
}

// Internal structs for deserializing the API response.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
