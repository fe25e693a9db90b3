// src/config/mod.rs
// All deployment-facing values come from the environment (.env supported).

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct EngramConfig {
    // ── Server
    pub host: String,
    pub port: u16,

    // ── Database
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Embedding / summarization API (OpenAI-compatible)
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub summary_model: String,
    pub summary_max_tokens: usize,

    // ── Qdrant
    pub qdrant_url: String,
    pub qdrant_collection: String,

    // ── Clustering
    pub cluster_eps: f64,
    pub cluster_min_pts: usize,
    pub cluster_interval_secs: u64,
    pub cluster_stability_secs: i64,

    // ── Abstraction
    pub abstraction_interval_secs: u64,
    pub max_abstraction_level: i32,

    // ── Retrieval
    pub min_cluster_similarity: f32,
    pub min_total_score: f32,

    // ── Cleanup / eviction
    pub cleanup_interval_secs: u64,
    pub max_total_fragments: usize,
    pub days_to_keep_original: i64,
    pub days_to_keep_abstracted: i64,
    pub min_access_to_preserve: i64,
    pub min_importance_to_preserve: f32,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Tolerate inline comments and stray whitespace in .env values
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl EngramConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            host: env_var_or("ENGRAM_HOST", "0.0.0.0".to_string()),
            port: env_var_or("ENGRAM_PORT", 3100),
            database_url: env_var_or("DATABASE_URL", "sqlite:./engram.db".to_string()),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 5),
            llm_base_url: env_var_or("LLM_BASE_URL", "https://api.openai.com".to_string()),
            llm_api_key: env_var_or("LLM_API_KEY", String::new()),
            embedding_model: env_var_or(
                "ENGRAM_EMBEDDING_MODEL",
                "text-embedding-3-small".to_string(),
            ),
            embedding_dim: env_var_or("ENGRAM_EMBEDDING_DIM", 384),
            summary_model: env_var_or("ENGRAM_SUMMARY_MODEL", "gpt-4o-mini".to_string()),
            summary_max_tokens: env_var_or("ENGRAM_SUMMARY_MAX_TOKENS", 256),
            qdrant_url: env_var_or("QDRANT_URL", "http://localhost:6333".to_string()),
            qdrant_collection: env_var_or("QDRANT_COLLECTION", "engram-fragments".to_string()),
            cluster_eps: env_var_or("ENGRAM_CLUSTER_EPS", 0.814),
            cluster_min_pts: env_var_or("ENGRAM_CLUSTER_MIN_PTS", 2),
            cluster_interval_secs: env_var_or("ENGRAM_CLUSTER_INTERVAL_SECS", 3600),
            cluster_stability_secs: env_var_or("ENGRAM_CLUSTER_STABILITY_SECS", 3600),
            abstraction_interval_secs: env_var_or("ENGRAM_ABSTRACTION_INTERVAL_SECS", 21600),
            max_abstraction_level: env_var_or("ENGRAM_MAX_ABSTRACTION_LEVEL", 5),
            min_cluster_similarity: env_var_or("ENGRAM_MIN_CLUSTER_SIMILARITY", 0.6),
            min_total_score: env_var_or("ENGRAM_MIN_TOTAL_SCORE", 0.3),
            cleanup_interval_secs: env_var_or("ENGRAM_CLEANUP_INTERVAL_SECS", 25200),
            max_total_fragments: env_var_or("ENGRAM_MAX_TOTAL_FRAGMENTS", 10000),
            days_to_keep_original: env_var_or("ENGRAM_DAYS_TO_KEEP_ORIGINAL", 30),
            days_to_keep_abstracted: env_var_or("ENGRAM_DAYS_TO_KEEP_ABSTRACTED", 90),
            min_access_to_preserve: env_var_or("ENGRAM_MIN_ACCESS_TO_PRESERVE", 3),
            min_importance_to_preserve: env_var_or("ENGRAM_MIN_IMPORTANCE_TO_PRESERVE", 0.7),
            log_level: env_var_or("ENGRAM_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<EngramConfig> = Lazy::new(EngramConfig::from_env);
