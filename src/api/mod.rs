// src/api/mod.rs

pub mod error;
pub mod memory;
pub mod router;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
