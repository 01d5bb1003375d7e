//! Error types for reshard

use thiserror::Error;

/// Result type alias using reshard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for resharding operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Weight not found: {0}")]
    WeightNotFound(String),

    #[error("{what} ({size}) is not evenly divisible by {divisor}")]
    Indivisible {
        what: String,
        size: usize,
        divisor: usize,
    },

    #[error("Slice range [{start}, {end}) out of bounds for axis {axis} with extent {extent}")]
    RangeOverflow {
        axis: usize,
        start: usize,
        end: usize,
        extent: usize,
    },

    #[error("Invalid topology: rank {rank} is not below world_size {world_size}")]
    InvalidTopology { rank: usize, world_size: usize },

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Unsupported dtype: {0}")]
    UnsupportedDtype(String),

    #[error("SafeTensors error: {0}")]
    SafeTensors(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<safetensors::SafeTensorError> for Error {
    fn from(e: safetensors::SafeTensorError) -> Self {
        Self::SafeTensors(e.to_string())
    }
}
