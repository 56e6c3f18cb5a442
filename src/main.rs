//! FICA Extractor - OCR plus model-assisted field extraction for identity documents.

mod assisted;
mod config;
mod error;
mod extractor;
mod ocr;
mod ollama;
mod patterns;
mod pipeline;
mod record;
mod server;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use config::{ModelMode, Settings};
use extractor::Extractor;
use ocr::TesseractEngine;
use ollama::OllamaClient;
use patterns::PatternExtractor;
use pipeline::Pipeline;
use record::ResultEnvelope;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fica-extractor", version, about = "Extract identity fields from scanned FICA documents")]
struct Cli {
    /// Ollama base URL (overrides OLLAMA_URL).
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Ollama model name (overrides OLLAMA_MODEL).
    #[arg(long, global = true)]
    ollama_model: Option<String>,

    /// JSON field rules file (overrides FICA_RULES_FILE).
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract fields from one document image and print the result as JSON.
    Extract {
        /// Path to the scanned image.
        image: PathBuf,

        /// Model usage for field extraction.
        #[arg(long, value_enum)]
        model: Option<ModelMode>,

        /// Shorthand for `--model on`.
        #[arg(long)]
        use_ollama: bool,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// Report whether the model endpoint is reachable.
    Status,
    /// Run the HTTP upload server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fica_extractor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_json(&ResultEnvelope::failure(format!("{:#}", e)), false);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::from_env()?;
    if let Some(url) = cli.ollama_url {
        settings.ollama_url = url;
    }
    if let Some(model) = cli.ollama_model {
        settings.ollama_model = model;
    }
    if let Some(rules) = cli.rules {
        settings.rules_file = Some(rules);
    }

    let pipeline = Arc::new(build_pipeline(&settings)?);

    match cli.command {
        Command::Extract {
            image,
            model,
            use_ollama,
            pretty,
        } => {
            let mode = if use_ollama {
                ModelMode::On
            } else {
                model.unwrap_or_default()
            };
            let use_model = pipeline.extractor().resolve_mode(mode).await;

            let envelope = pipeline.run(image, use_model).await;
            print_json(&envelope, pretty);

            Ok(if envelope.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Status => {
            let status = pipeline.extractor().model().status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(if status.model_available {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Serve { bind } => {
            server::serve(&bind, pipeline).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let rules = settings.load_rules()?;
    let patterns = PatternExtractor::compile(&rules);
    let model = OllamaClient::from_settings(settings);
    let ocr = TesseractEngine::from_settings(settings);

    info!(
        "Pipeline ready: ollama={} model={} tesseract={} lang={}",
        model.endpoint(),
        model.model(),
        settings.tesseract_cmd,
        settings.tesseract_lang
    );

    Ok(Pipeline::new(Arc::new(ocr), Extractor::new(patterns, model)))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => println!(r#"{{"error":"failed to serialize result: {}"}}"#, e),
    }
}
