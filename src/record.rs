//! Extracted record and result envelope types.
//!
//! These are the JSON shapes printed by the CLI and returned by the server.

use serde::{Deserialize, Serialize};

/// The seven identity/contact fields pulled out of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FullName,
    IdNumber,
    Email,
    Phone,
    Address,
    Employment,
    Income,
}

impl Field {
    /// All fields, in output order.
    pub const ALL: [Field; 7] = [
        Field::FullName,
        Field::IdNumber,
        Field::Email,
        Field::Phone,
        Field::Address,
        Field::Employment,
        Field::Income,
    ];

    /// JSON key used for this field in the record.
    pub fn key(self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::IdNumber => "idNumber",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Address => "address",
            Field::Employment => "employment",
            Field::Income => "income",
        }
    }
}

/// Fixed-shape structured record. Missing data is an empty string, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub id_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub employment: String,
    #[serde(default)]
    pub income: String,
}

impl ExtractedRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::IdNumber => &self.id_number,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Address => &self.address,
            Field::Employment => &self.employment,
            Field::Income => &self.income,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::FullName => &mut self.full_name,
            Field::IdNumber => &mut self.id_number,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Address => &mut self.address,
            Field::Employment => &mut self.employment,
            Field::Income => &mut self.income,
        };
        *slot = value;
    }

    /// Number of fields holding a non-empty value.
    pub fn filled_count(&self) -> usize {
        Field::ALL
            .iter()
            .filter(|f| !self.get(**f).is_empty())
            .count()
    }
}

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Pattern,
    Model,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Pattern => f.write_str("pattern"),
            ExtractionMethod::Model => f.write_str("model"),
        }
    }
}

/// Top-level output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultEnvelope {
    #[serde(rename_all = "camelCase")]
    Success {
        success: bool,
        extracted_text: String,
        tenant_data: ExtractedRecord,
    },
    Failure {
        error: String,
    },
}

impl ResultEnvelope {
    pub fn success(extracted_text: String, tenant_data: ExtractedRecord) -> Self {
        Self::Success {
            success: true,
            extracted_text,
            tenant_data,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_all_keys_in_order() {
        let record = ExtractedRecord {
            full_name: "JOHN SMITH".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"fullName":"JOHN SMITH","idNumber":"","email":"","phone":"","address":"","employment":"","income":""}"#
        );
    }

    #[test]
    fn test_field_keys_match_serialized_names() {
        let value = serde_json::to_value(ExtractedRecord::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), Field::ALL.len());
        for field in Field::ALL {
            assert!(obj.contains_key(field.key()), "missing {}", field.key());
        }
    }

    #[test]
    fn test_get_set_roundtrip_per_field() {
        let mut record = ExtractedRecord::default();
        record.set(Field::Income, "R15000".to_string());
        record.set(Field::Email, "john@example.com".to_string());
        assert_eq!(record.get(Field::Income), "R15000");
        assert_eq!(record.income, "R15000");
        assert_eq!(record.email, "john@example.com");
        assert_eq!(record.filled_count(), 2);
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = ResultEnvelope::success("text".to_string(), ExtractedRecord::default());
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["extractedText"], "text");
        assert_eq!(value["tenantData"]["fullName"], "");
        assert!(ok.is_success());

        let err = ResultEnvelope::failure("No text extracted from image");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, serde_json::json!({"error": "No text extracted from image"}));
        assert!(!err.is_success());
    }
}
