//! Document pipeline: image → OCR text → structured record → result envelope.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::error::PipelineError;
use crate::extractor::{Extractor, FieldExtraction};
use crate::ocr::OcrEngine;
use crate::record::ResultEnvelope;

/// Successful pipeline output.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// OCR text with surrounding whitespace trimmed.
    pub text: String,
    pub extraction: FieldExtraction,
}

impl PipelineOutput {
    pub fn into_envelope(self) -> ResultEnvelope {
        ResultEnvelope::success(self.text, self.extraction.record)
    }
}

pub struct Pipeline {
    ocr: Arc<dyn OcrEngine>,
    extractor: Extractor,
}

impl Pipeline {
    pub fn new(ocr: Arc<dyn OcrEngine>, extractor: Extractor) -> Self {
        Self { ocr, extractor }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Run one document through OCR and field extraction.
    pub async fn process(
        &self,
        image_path: &Path,
        use_model: bool,
    ) -> Result<PipelineOutput, PipelineError> {
        if !image_path.exists() {
            return Err(PipelineError::FileNotFound(image_path.to_path_buf()));
        }

        info!(
            "Processing {} (engine={}, model={})",
            image_path.display(),
            self.ocr.name(),
            use_model
        );

        let raw = self.ocr.recognize(image_path).await?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(PipelineError::NoText);
        }

        let extraction = self.extractor.extract(text, use_model).await;

        info!(
            "Extraction complete: {} chars, {} fields via {}",
            text.len(),
            extraction.record.filled_count(),
            extraction.method
        );

        Ok(PipelineOutput {
            text: text.to_string(),
            extraction,
        })
    }

    /// Like [`process`](Self::process), but a panic anywhere in the run is
    /// reported as [`PipelineError::Unexpected`] instead of unwinding.
    pub async fn process_guarded(
        self: Arc<Self>,
        image_path: PathBuf,
        use_model: bool,
    ) -> Result<PipelineOutput, PipelineError> {
        let handle =
            tokio::spawn(async move { self.process(&image_path, use_model).await });

        match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                Err(PipelineError::Unexpected(message))
            }
        }
    }

    /// Run the pipeline and build the result envelope.
    pub async fn run(self: Arc<Self>, image_path: PathBuf, use_model: bool) -> ResultEnvelope {
        match self.process_guarded(image_path, use_model).await {
            Ok(output) => output.into_envelope(),
            Err(e) => {
                error!("Pipeline failed: {}", e);
                ResultEnvelope::failure(e.to_string())
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected internal error".to_string()
    }
}
