//! Model-assisted field extraction.
//!
//! Asks the model for the same fixed-shape record the pattern rules produce.
//! Every failure is folded into [`ModelExtraction::Unavailable`] so the caller
//! has a single branch to fall back on.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ModelFailure;
use crate::ollama::OllamaClient;
use crate::record::{ExtractedRecord, Field};

/// Outcome of one model attempt.
#[derive(Debug)]
pub enum ModelExtraction {
    Record(ExtractedRecord),
    Unavailable(ModelFailure),
}

/// Build the instruction prompt embedding the document text.
pub fn build_prompt(text: &str) -> String {
    let keys = Field::ALL
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Extract the following information from this South African ID/FICA document text.
Return ONLY a valid JSON object with these fields: {keys}.
If a field is not found, use empty string "".

Document text:
{text}

Return JSON only, no other text:"#
    )
}

/// Ask the model for a record. Never returns an error; failures are logged
/// and reported as `Unavailable`.
pub async fn extract_via_model(text: &str, client: &OllamaClient) -> ModelExtraction {
    let prompt = build_prompt(text);

    let outcome = match client.generate_json(&prompt).await {
        Ok(raw) => {
            debug!("Raw model response length: {} chars", raw.len());
            decode_record(&raw)
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(record) => {
            info!(
                "Model extraction filled {}/{} fields",
                record.filled_count(),
                Field::ALL.len()
            );
            ModelExtraction::Record(record)
        }
        Err(failure) => {
            match &failure {
                ModelFailure::Connect(_) => {
                    warn!("Ollama not available at {}, using pattern parsing", client.endpoint())
                }
                ModelFailure::Status(status) => warn!("Ollama API error: {}", status),
                other => warn!("Ollama parsing error: {}", other),
            }
            ModelExtraction::Unavailable(failure)
        }
    }
}

/// Decode the model's JSON text into a record.
///
/// Missing keys and nulls become empty strings, scalars are stringified and
/// unknown keys are ignored. A non-object or an empty object is a failure.
fn decode_record(raw: &str) -> Result<ExtractedRecord, ModelFailure> {
    let value: Value = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        ModelFailure::Decode(format!(
            "{}: {}",
            e,
            raw.chars().take(200).collect::<String>()
        ))
    })?;

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ModelFailure::Decode(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    if obj.is_empty() {
        return Err(ModelFailure::Empty);
    }

    let mut record = ExtractedRecord::default();
    for field in Field::ALL {
        let value = match obj.get(field.key()) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        record.set(field, value);
    }
    Ok(record)
}

/// Models sometimes wrap JSON in markdown fences even in JSON mode.
fn strip_code_fence(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
