//! Error types for dataset loading and mesh I/O.

use thiserror::Error;

/// Errors that can occur while loading frames or writing meshes.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Transforms file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PLY error: {0}")]
    Ply(String),

    #[error("Frame {index} is {got_w}x{got_h}, dataset frames are {want_w}x{want_h}")]
    ResolutionMismatch {
        index: usize,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("Frames are {width}x{height}; both sides must be non-zero")]
    ZeroResolution { width: u32, height: u32 },

    #[error("Dataset has no frames")]
    Empty,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DataError>;
