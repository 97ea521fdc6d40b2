//! Error types for wire frame decoding.

use thiserror::Error;

/// Errors produced while decoding an inbound frame.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The frame was not valid JSON at all.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame parsed as JSON but matches no known message kind.
    #[error("unrecognized frame shape: {0}")]
    UnrecognizedShape(String),

    /// One record inside a telemetry batch failed to decode.
    #[error("telemetry record {index}: {message}")]
    BadRecord {
        /// Zero-based position of the record in the batch.
        index: usize,
        /// Description of the decode failure.
        message: String,
    },
}
