//! Error types for the tile benchmark.
//!
//! Only configuration faults are errors. Per-tile transport failures and
//! 5xx responses are measured outcomes and never surface here.

use thiserror::Error;

use crate::template::TemplateError;
use tile_common::TileError;

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown tile source: {0}")]
    UnknownSource(String),

    #[error("Invalid URL template: {0}")]
    Template(#[from] TemplateError),

    #[error("Tile error: {0}")]
    Tile(#[from] TileError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Config(message.into())
    }
}
