//! Error types for the extraction pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Terminal pipeline failures. Each one becomes an `{"error": ...}` envelope.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Tesseract OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("No text extracted from image")]
    NoText,

    /// Anything not covered above, reported with its own message.
    #[error("{0}")]
    Unexpected(String),
}

/// Failures raised by an OCR engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The file exists but could not be decoded as an image.
    #[error("cannot identify image file: {0}")]
    UnreadableImage(String),

    /// The engine binary could not be started.
    #[error("failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// The engine ran and reported an error.
    #[error("{0}")]
    Engine(String),
}

/// Soft failures of the model endpoint. Never terminal: the orchestrator
/// falls back to pattern extraction when it sees one.
#[derive(Error, Debug)]
pub enum ModelFailure {
    #[error("model endpoint unreachable: {0}")]
    Connect(String),

    #[error("model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ollama API error: {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid model response: {0}")]
    Decode(String),

    #[error("model returned no fields")]
    Empty,

    #[error("model request failed: {0}")]
    Request(String),
}

impl ModelFailure {
    /// Classify a transport error from reqwest.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
