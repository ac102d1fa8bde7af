//! Error types for shotmark

use std::path::PathBuf;
use thiserror::Error;

/// Failures of one capture attempt. None of them touch the history.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Selection too small: {width}x{height}")]
    DegenerateSelection { width: f64, height: f64 },

    #[error("Window enumeration failed: {0}")]
    CandidateEnumerationFailed(String),

    #[error("A capture is already in progress")]
    CaptureInProgress,

    #[error("Capture primitive returned no image")]
    CaptureUnavailable,

    #[error("Capture cancelled")]
    CaptureCancelled,

    #[error("No displays found")]
    NoDisplays,

    #[error("No display surface at index {0}")]
    InvalidSurface(usize),

    #[error("Window {0} is not a capture candidate")]
    UnknownWindow(u32),

    #[error("Event {event} is not valid in state {state}")]
    UnexpectedEvent { state: String, event: &'static str },
}

/// Raised when an annotation is built or parsed, never while rendering.
#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Annotation geometry contains a non-finite coordinate")]
    NonFiniteGeometry,

    #[error("Invalid stroke width: {0}")]
    InvalidStrokeWidth(f32),

    #[error("Invalid annotation JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error("Image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
