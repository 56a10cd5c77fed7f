use std::path::PathBuf;
use thiserror::Error;

use crate::geom::Rect;

/// The main error type for cropgen operations.
#[derive(Debug, Error)]
pub enum CropgenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sampler geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("No sample windows survived enumeration and filtering")]
    EmptyDataset,

    #[error(
        "Window {window:?} of sample {sample_index} does not fit image {image_index} ({width}x{height})"
    )]
    ImageBoundsViolation {
        sample_index: usize,
        image_index: usize,
        window: Rect,
        width: u32,
        height: u32,
    },

    #[error("Snapshot is truncated: expected at least {expected} bytes, got {actual}")]
    SnapshotTruncated { expected: usize, actual: usize },

    #[error("Snapshot has unrecognized magic bytes")]
    SnapshotBadMagic,

    #[error("Snapshot checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    SnapshotChecksum { stored: u32, computed: u32 },

    #[error("Failed to parse snapshot header: {source}")]
    SnapshotHeader {
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot payload is inconsistent: {message}")]
    SnapshotPayload { message: String },

    #[error("Failed to parse annotation sidecar {path}: {source}")]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No images found under {path}")]
    EmptyImageDir { path: PathBuf },
}

impl CropgenError {
    /// Builds an `InvalidGeometry` error from anything displayable.
    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// Builds a `SnapshotPayload` error from anything displayable.
    pub(crate) fn payload(message: impl Into<String>) -> Self {
        Self::SnapshotPayload {
            message: message.into(),
        }
    }
}
