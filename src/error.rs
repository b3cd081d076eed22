//! Error types for snapshot rendering and report export.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that escape the export pipeline.
///
/// Missing data (no elements, no inputs, no stage dimensions, stale snapshot
/// references) is never reported through this type; those cases resolve to a
/// fallback inside the pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot filename: {0:?}")]
    InvalidFilename(String),

    #[error("failed to allocate {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },

    #[error("failed to build snapshot scene: {0}")]
    Scene(String),

    #[error("PNG encoding error: {0}")]
    PngEncode(#[from] png::EncodingError),

    #[error("PNG decoding error: {0}")]
    PngDecode(#[from] png::DecodingError),

    #[error("unsupported image layout: {0}")]
    UnsupportedImage(String),

    #[error("plot {0} not found")]
    PlotNotFound(i64),

    #[error("data access failed: {0}")]
    Repository(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;
