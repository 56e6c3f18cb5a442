//! OCR engine abstraction.
//!
//! Defines the [`OcrEngine`] trait so the pipeline can run against the
//! Tesseract command-line engine or a test double.

pub mod tesseract;

use std::path::Path;

use crate::error::OcrError;

pub use tesseract::TesseractEngine;

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Return the raw, untrimmed text recognized in the image at `image`.
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}
