//! Structured outputs requested from the generation backend, plus the
//! pipeline's own result and telemetry types.
//!
//! No `#[serde(default)]` on the LLM-facing structs: a missing field is a
//! validation failure and triggers a retry. Nullable fields go through
//! `required_nullable`, so their key must still be present.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::llm_client::StructuredOutput;
use crate::matching::matcher::MatchScore;

// ────────────────────────────────────────────────────────────────────────────
// Entity extraction
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub role: String,
    pub company: String,
    pub duration: String,
    pub highlights: Vec<String>,
}

impl ExperienceItem {
    /// One-line rendering used as embedding input.
    pub fn summary(&self) -> String {
        format!("{} at {} ({})", self.role, self.company, self.duration)
    }
}

/// Accepts `null` but not a missing key. Serde would otherwise fill a
/// missing `Option` with `None`.
fn required_nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(deserialize_with = "required_nullable")]
    pub email: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub linkedin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub skills: Vec<String>,
    pub tools: Vec<String>,
    pub education: Vec<String>,
    pub experience: Vec<ExperienceItem>,
    #[serde(deserialize_with = "required_nullable")]
    pub contact: Option<ContactInfo>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.tools.is_empty()
            && self.education.is_empty()
            && self.experience.is_empty()
            && self.contact.is_none()
    }
}

impl StructuredOutput for ExtractedEntities {
    const NAME: &'static str = "ExtractedEntities";

    fn json_schema() -> Value {
        let string_list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "skills": string_list,
                "tools": string_list,
                "education": string_list,
                "experience": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "role": {"type": "string"},
                            "company": {"type": "string"},
                            "duration": {"type": "string"},
                            "highlights": string_list
                        },
                        "required": ["role", "company", "duration", "highlights"]
                    }
                },
                "contact": {
                    "type": ["object", "null"],
                    "properties": {
                        "email": {"type": ["string", "null"]},
                        "phone": {"type": ["string", "null"]},
                        "linkedin": {"type": ["string", "null"]}
                    },
                    "required": ["email", "phone", "linkedin"]
                }
            },
            "required": ["skills", "tools", "education", "experience", "contact"]
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Alignment analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Resume,
    Job,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source: EvidenceSource,
    pub snippet: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentInsights {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub weak: Vec<String>,
    pub evidence: Vec<EvidenceItem>,
}

impl StructuredOutput for AlignmentInsights {
    const NAME: &'static str = "AlignmentInsights";

    fn json_schema() -> Value {
        let string_list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "matched": string_list,
                "missing": string_list,
                "weak": string_list,
                "evidence": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "source": {"type": "string", "enum": ["resume", "job"]},
                            "snippet": {"type": "string"},
                            "note": {"type": "string"}
                        },
                        "required": ["source", "snippet", "note"]
                    }
                }
            },
            "required": ["matched", "missing", "weak", "evidence"]
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume rewrite
// ────────────────────────────────────────────────────────────────────────────

/// Fields the rewrite call must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreResult {
    pub score: i64,
    pub missing_keywords: Vec<String>,
    pub covered_keywords: Vec<String>,
    pub change_log: Vec<String>,
    #[serde(alias = "preview_markdown")]
    pub preview_text: String,
}

impl StructuredOutput for CoreResult {
    const NAME: &'static str = "OptimizationResultCore";

    fn json_schema() -> Value {
        let string_list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "score": {"type": "integer", "minimum": 0, "maximum": 100},
                "missing_keywords": string_list,
                "covered_keywords": string_list,
                "change_log": string_list,
                "preview_text": {"type": "string"}
            },
            "required": ["score", "missing_keywords", "covered_keywords", "change_log", "preview_text"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if !(0..=100).contains(&self.score) {
            return Err(format!("score {} is outside 0-100", self.score));
        }
        if self.preview_text.trim().is_empty() {
            return Err("preview_text is empty".to_string());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline output
// ────────────────────────────────────────────────────────────────────────────

/// The pipeline's output for one task. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub score: u32,
    pub missing_keywords: Vec<String>,
    pub covered_keywords: Vec<String>,
    pub change_log: Vec<String>,
    pub preview_text: String,
    pub extracted_entities: ExtractedEntities,
    pub alignment_insights: AlignmentInsights,
    pub is_refinement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<MatchScore>,
}

/// Execution telemetry for one `optimize()` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    pub invalid_json_attempts: u32,
    pub total_attempts: u32,
    pub latency_seconds: f64,
    pub last_run_valid: bool,
}

impl Default for ReliabilityMetrics {
    fn default() -> Self {
        Self {
            invalid_json_attempts: 0,
            total_attempts: 0,
            latency_seconds: 0.0,
            last_run_valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{parse_structured, LlmError};

    #[test]
    fn test_entities_require_every_field() {
        let err = parse_structured::<ExtractedEntities>(
            r#"{"skills": ["Rust"], "tools": [], "education": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_entities_accept_null_contact() {
        let entities = parse_structured::<ExtractedEntities>(
            r#"{
                "skills": ["Rust"],
                "tools": ["Docker"],
                "education": ["BSc"],
                "experience": [
                    {"role": "Engineer", "company": "Acme", "duration": "2020-2023", "highlights": ["Shipped X"]}
                ],
                "contact": null
            }"#,
        )
        .unwrap();
        assert_eq!(entities.experience[0].summary(), "Engineer at Acme (2020-2023)");
        assert!(entities.contact.is_none());
        assert!(!entities.is_empty());
    }

    #[test]
    fn test_entities_require_contact_key() {
        let err = parse_structured::<ExtractedEntities>(
            r#"{"skills": ["Rust"], "tools": [], "education": [], "experience": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_contact_fields_are_required_but_nullable() {
        let entities = parse_structured::<ExtractedEntities>(
            r#"{
                "skills": [], "tools": [], "education": [], "experience": [],
                "contact": {"email": "jane@example.com", "phone": null, "linkedin": null}
            }"#,
        )
        .unwrap();
        let contact = entities.contact.unwrap();
        assert_eq!(contact.email.as_deref(), Some("jane@example.com"));
        assert!(contact.phone.is_none());

        let err = parse_structured::<ExtractedEntities>(
            r#"{
                "skills": [], "tools": [], "education": [], "experience": [],
                "contact": {"email": "jane@example.com"}
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_default_entities_are_empty() {
        assert!(ExtractedEntities::default().is_empty());
    }

    #[test]
    fn test_evidence_source_must_be_resume_or_job() {
        let err = parse_structured::<AlignmentInsights>(
            r#"{"matched": [], "missing": [], "weak": [],
                "evidence": [{"source": "linkedin", "snippet": "x", "note": "y"}]}"#,
        )
        .unwrap_err();
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_core_result_rejects_out_of_range_score() {
        let err = parse_structured::<CoreResult>(
            r#"{"score": 140, "missing_keywords": [], "covered_keywords": [],
                "change_log": [], "preview_text": "resume"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[test]
    fn test_core_result_accepts_preview_markdown_alias() {
        let core = parse_structured::<CoreResult>(
            r#"{"score": 72, "missing_keywords": ["Kafka"], "covered_keywords": ["Rust"],
                "change_log": ["Added summary"], "preview_markdown": "Jane Doe"}"#,
        )
        .unwrap();
        assert_eq!(core.score, 72);
        assert_eq!(core.preview_text, "Jane Doe");
    }

    #[test]
    fn test_metrics_start_valid() {
        let metrics = ReliabilityMetrics::default();
        assert!(metrics.last_run_valid);
        assert_eq!(metrics.total_attempts, 0);
    }
}
