//! Tesseract OCR engine (runs the `tesseract` command-line program).

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use super::OcrEngine;
use crate::config::Settings;
use crate::error::OcrError;

pub struct TesseractEngine {
    command: String,
    lang: String,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            lang: lang.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.tesseract_cmd.clone(), settings.tesseract_lang.clone())
    }
}

/// Check that the file decodes as an image before handing it to Tesseract.
fn probe_image(path: &Path) -> Result<(u32, u32), OcrError> {
    let reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| OcrError::UnreadableImage(e.to_string()))?;

    reader
        .into_dimensions()
        .map_err(|e| OcrError::UnreadableImage(e.to_string()))
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let (width, height) = probe_image(image)?;
        info!(
            "TesseractEngine: recognizing {} ({}x{}, lang={})",
            image.display(),
            width,
            height,
            self.lang
        );

        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .await
            .map_err(|e| OcrError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.command, output.status)
            } else {
                stderr
            };
            return Err(OcrError::Engine(message));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("TesseractEngine: {} chars recognized", text.len());
        Ok(text)
    }
}
