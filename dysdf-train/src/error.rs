//! Error types for the training and evaluation drivers.

use thiserror::Error;

/// Errors raised while preparing batches, scoring outputs or exporting results.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Level '{level}' {field} has {got} values, batch has {expected} rays")]
    OutputSize {
        level: String,
        field: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("Image index {index} out of range for {len} images")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Dataset has no images")]
    EmptyDataset,

    #[error("Evaluation needs a full-frame batch")]
    NotFullFrame,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data error: {0}")]
    Data(#[from] dysdf_data::DataError),
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;
