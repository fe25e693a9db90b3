// src/memory/error.rs

use thiserror::Error;

/// Hard precondition violations. Unlike data anomalies (missing embeddings,
/// dangling parents), these indicate a broken deployment and propagate
/// immediately to the caller.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("embedding dimension mismatch: got {actual}, configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
