//! Runtime configuration.
//!
//! Settings come from the environment (a `.env` file is loaded first by
//! `main`) and can be overridden by command-line flags. Field rules default to
//! the built-in table and may be replaced by a JSON rules file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::patterns::RuleSet;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TESSERACT_CMD: &str = "tesseract";
const DEFAULT_TESSERACT_LANG: &str = "eng";

/// Whether field extraction should try the model first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// Pattern rules only.
    #[default]
    Off,
    /// Model first, pattern rules on any model failure.
    On,
    /// Like `on` if the endpoint lists the configured model, else `off`.
    Auto,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub ollama_url: String,
    pub ollama_model: String,
    pub model_timeout: Duration,
    pub tesseract_cmd: String,
    pub tesseract_lang: String,
    pub rules_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_timeout = match get("OLLAMA_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid OLLAMA_TIMEOUT_SECS: {:?}", raw))?;
                if secs == 0 {
                    anyhow::bail!("OLLAMA_TIMEOUT_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
        };

        Ok(Self {
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: get("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            model_timeout,
            tesseract_cmd: get("TESSERACT_CMD").unwrap_or_else(|| DEFAULT_TESSERACT_CMD.to_string()),
            tesseract_lang: get("TESSERACT_LANG")
                .unwrap_or_else(|| DEFAULT_TESSERACT_LANG.to_string()),
            rules_file: get("FICA_RULES_FILE").map(PathBuf::from),
        })
    }

    /// Rules from `rules_file` if set, otherwise the built-in table.
    pub fn load_rules(&self) -> Result<RuleSet> {
        match &self.rules_file {
            Some(path) => load_rules(path),
            None => Ok(RuleSet::builtin()),
        }
    }
}

/// Load a field rule table from a JSON file.
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {:?}", path))?;

    let rules: RuleSet = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse rules file: {:?}", path))?;

    if rules.rules.is_empty() {
        anyhow::bail!("No field rules found in {:?}", path);
    }

    info!("Loaded {} field rules from {:?}", rules.rules.len(), path);
    Ok(rules)
}
