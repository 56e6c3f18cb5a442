//! Rule-based field extraction from OCR text.
//!
//! Pure functions, no async. Each field has an ordered list of candidate
//! regexes; the first candidate that matches anywhere in the text wins and
//! the rest are not tried. Fields are matched independently, so the same
//! substring may feed more than one field.
//!
//! The bare fallbacks (any 13 digits as an ID, any 10 digits as a phone, any
//! multi-word uppercase run as a name) favour recall and will pick up unrelated numbers
//! on busy documents.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::record::{ExtractedRecord, Field};

/// A serializable table of field rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<FieldRule>,
}

/// Ordered candidate patterns for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    /// Candidates, tried in order. Capture group 1 is the value if present.
    pub patterns: Vec<Candidate>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub normalize: Normalize,
}

/// One candidate pattern. A plain string in rule files, or an object with
/// `min_len` when short matches should be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidate {
    Pattern(String),
    Bounded {
        pattern: String,
        /// Minimum length in characters of the normalized value.
        min_len: usize,
    },
}

impl Candidate {
    fn pattern(&self) -> &str {
        match self {
            Candidate::Pattern(pattern) | Candidate::Bounded { pattern, .. } => pattern,
        }
    }

    fn min_len(&self) -> usize {
        match self {
            Candidate::Pattern(_) => 0,
            Candidate::Bounded { min_len, .. } => *min_len,
        }
    }
}

impl From<&str> for Candidate {
    fn from(pattern: &str) -> Self {
        Candidate::Pattern(pattern.to_string())
    }
}

/// Post-processing applied to a matched value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    #[default]
    Trim,
    /// Remove every whitespace character.
    StripWhitespace,
    /// Drop thousands separators and prefix with `R`.
    RandAmount,
    /// Keep the match exactly as found.
    #[serde(rename = "none")]
    Verbatim,
}

impl Normalize {
    pub fn apply(self, value: &str) -> String {
        match self {
            Normalize::Trim => value.trim().to_string(),
            Normalize::StripWhitespace => value.chars().filter(|c| !c.is_whitespace()).collect(),
            Normalize::RandAmount => format!("R{}", value.trim().replace(',', "")),
            Normalize::Verbatim => value.to_string(),
        }
    }
}

impl RuleSet {
    /// Built-in rules for South African ID / FICA documents.
    pub fn builtin() -> Self {
        fn rule(
            field: Field,
            case_insensitive: bool,
            normalize: Normalize,
            patterns: Vec<Candidate>,
        ) -> FieldRule {
            FieldRule {
                field,
                patterns,
                case_insensitive,
                normalize,
            }
        }

        Self {
            rules: vec![
                rule(
                    Field::IdNumber,
                    true,
                    Normalize::StripWhitespace,
                    vec![
                        r"(?:id|identity|id\s*number|id\s*no)[\s#:]+([0-9]{13})".into(),
                        r"([0-9]{13})".into(),
                        r"([0-9]{6}[0-9]{7})".into(),
                        r"([0-9]{6}\s+[0-9]{7})".into(),
                        // YYMMDD followed by seven digits
                        r"([0-9]{2}[0-1][0-9][0-3][0-9][0-9]{7})".into(),
                    ],
                ),
                rule(
                    Field::FullName,
                    false,
                    Normalize::Trim,
                    vec![
                        r"(?i:name)[:\s]+([A-Z][A-Z \t]+[A-Z])".into(),
                        r"(?i:name)[:\s]+([A-Z][a-z]+ [A-Z][a-z]+)".into(),
                        // Uppercase run with at least one space, 6+ characters
                        Candidate::Bounded {
                            pattern: r"([A-Z][A-Z \t]*[ \t][A-Z \t]*)".to_string(),
                            min_len: 6,
                        },
                    ],
                ),
                rule(
                    Field::Email,
                    false,
                    Normalize::Verbatim,
                    vec![r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})".into()],
                ),
                rule(
                    Field::Phone,
                    false,
                    Normalize::Trim,
                    vec![
                        r"(\+27[\s]?[0-9]{2}[\s]?[0-9]{3}[\s]?[0-9]{4})".into(),
                        r"(0[0-9]{2}[\s]?[0-9]{3}[\s]?[0-9]{4})".into(),
                        r"([0-9]{10})".into(),
                    ],
                ),
                rule(
                    Field::Address,
                    true,
                    Normalize::Trim,
                    vec![r"address[:\s]+(.+?)(?:\n|email|phone|occupation|income)".into()],
                ),
                rule(
                    Field::Employment,
                    true,
                    Normalize::Trim,
                    vec![r"(?:occupation|employment|job|profession)[:\s]+(.+?)(?:\n|income|employer)".into()],
                ),
                rule(
                    Field::Income,
                    true,
                    Normalize::RandAmount,
                    vec![r"(?:income|salary|monthly\s+income)[:\s]+R?\s?([0-9,]+)".into()],
                ),
            ],
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Pre-compiled rule table ready for matching.
pub struct PatternExtractor {
    rules: Vec<CompiledRule>,
}

struct CompiledRule {
    field: Field,
    candidates: Vec<CompiledCandidate>,
    normalize: Normalize,
}

struct CompiledCandidate {
    regex: Regex,
    min_len: usize,
}

impl PatternExtractor {
    /// Compile a rule set. Invalid regexes are skipped with a warning; the
    /// remaining candidates keep their relative order.
    pub fn compile(rule_set: &RuleSet) -> Self {
        let mut rules = Vec::with_capacity(rule_set.rules.len());

        for rule in &rule_set.rules {
            let mut candidates = Vec::with_capacity(rule.patterns.len());
            for candidate in &rule.patterns {
                match RegexBuilder::new(candidate.pattern())
                    .case_insensitive(rule.case_insensitive)
                    .build()
                {
                    Ok(regex) => candidates.push(CompiledCandidate {
                        regex,
                        min_len: candidate.min_len(),
                    }),
                    Err(e) => {
                        warn!(
                            "Skipping invalid {} pattern ({}): {}",
                            rule.field.key(),
                            candidate.pattern(),
                            e
                        );
                    }
                }
            }

            rules.push(CompiledRule {
                field: rule.field,
                candidates,
                normalize: rule.normalize,
            });
        }

        debug!(
            "Compiled {} field rules ({} patterns)",
            rules.len(),
            rules.iter().map(|r| r.candidates.len()).sum::<usize>()
        );
        Self { rules }
    }

    #[cfg(test)]
    pub fn builtin() -> Self {
        Self::compile(&RuleSet::builtin())
    }

    /// Extract every field from `text`. Never fails; unmatched fields stay empty.
    ///
    /// If a rule set lists the same field twice, the later rule only runs
    /// when the earlier ones left the field empty.
    pub fn extract(&self, text: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();

        for rule in &self.rules {
            if !record.get(rule.field).is_empty() {
                continue;
            }
            if let Some(value) = rule.first_match(text) {
                record.set(rule.field, value);
            }
        }

        debug!(
            "Pattern extraction filled {}/{} fields",
            record.filled_count(),
            Field::ALL.len()
        );
        record
    }
}

impl CompiledRule {
    /// First candidate with a qualifying match wins. Within a candidate,
    /// matches shorter than `min_len` are skipped in favour of later ones.
    fn first_match(&self, text: &str) -> Option<String> {
        self.candidates.iter().find_map(|candidate| {
            candidate.regex.captures_iter(text).find_map(|cap| {
                // Use first capture group if available, otherwise full match
                let raw = cap
                    .get(1)
                    .or_else(|| cap.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let value = self.normalize.apply(raw);
                (value.chars().count() >= candidate.min_len).then_some(value)
            })
        })
    }
}
