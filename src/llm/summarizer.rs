// src/llm/summarizer.rs
// Condenses related memory fragments into a short abstraction via a
// chat-completions endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::memory::traits::Summarizer;

const ABSTRACTION_PROMPT: &str = "\
Create a concise, high-level abstraction from the following conversation fragments.
- Condense multiple related details into essential concepts
- Generalize specific instances into broader patterns
- Remove redundant or trivial information
- Keep critical identifiers (names, locations) but generalize contexts
- Answer with a 1-2 sentence summary that captures the essence";

pub struct SummaryClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl SummaryClient {
    pub fn new(base_url: String, api_key: String, model: String, max_tokens: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl Summarizer for SummaryClient {
    async fn summarize(&self, text: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": ABSTRACTION_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        debug!(chars = text.len(), model = %self.model, "requesting summary");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(anyhow!("Summary API error ({}): {}", status, error_text));
        }

        let result: ChatResponse = response.json().await?;
        let summary = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("No choices in summary API response"))?;

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(anyhow!("Summary API returned empty content"));
        }

        Ok(summary)
    }
}

// Internal structs for deserializing the API response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
