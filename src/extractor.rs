//! Field extraction orchestrator: model first when enabled, pattern rules as
//! the terminal fallback.

use tracing::{info, warn};

use crate::assisted::{self, ModelExtraction};
use crate::config::ModelMode;
use crate::ollama::OllamaClient;
use crate::patterns::PatternExtractor;
use crate::record::{ExtractedRecord, ExtractionMethod};

/// A record plus the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction {
    pub record: ExtractedRecord,
    pub method: ExtractionMethod,
}

pub struct Extractor {
    patterns: PatternExtractor,
    model: OllamaClient,
}

impl Extractor {
    pub fn new(patterns: PatternExtractor, model: OllamaClient) -> Self {
        Self { patterns, model }
    }

    /// Extract fields from `text`. Never fails: with `use_model` set, any
    /// model failure falls back to the pattern rules. A model record is
    /// returned as-is, without merging pattern results.
    pub async fn extract(&self, text: &str, use_model: bool) -> FieldExtraction {
        if use_model {
            match assisted::extract_via_model(text, &self.model).await {
                ModelExtraction::Record(record) => {
                    return FieldExtraction {
                        record,
                        method: ExtractionMethod::Model,
                    };
                }
                ModelExtraction::Unavailable(failure) => {
                    info!("Falling back to pattern extraction ({})", failure);
                }
            }
        }

        FieldExtraction {
            record: self.patterns.extract(text),
            method: ExtractionMethod::Pattern,
        }
    }

    /// Decide whether to use the model for a run.
    pub async fn resolve_mode(&self, mode: ModelMode) -> bool {
        match mode {
            ModelMode::Off => false,
            ModelMode::On => true,
            ModelMode::Auto => {
                let status = self.model.status().await;
                if status.model_available {
                    info!(
                        "Ollama detected at {} with model {}",
                        status.endpoint, status.model
                    );
                } else if status.reachable {
                    warn!(
                        "Ollama reachable but model {} not found, using pattern parsing",
                        status.model
                    );
                } else {
                    info!("Ollama not available, using pattern parsing");
                }
                status.model_available
            }
        }
    }

    pub fn model(&self) -> &OllamaClient {
        &self.model
    }
}
