//! Google Gemini backend (generateContent + embedContent).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, send_with_retry, with_schema_instruction, GenerationBackend, LlmError, OutputSchema};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const MODEL: &str = "gemini-2.0-flash";
pub const EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("Gemini"));
        }

        let system = match schema {
            Some(schema) => with_schema_instruction(system_prompt, schema),
            None => system_prompt.to_string(),
        };

        let request_body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: if schema.is_some() {
                    "application/json"
                } else {
                    "text/plain"
                },
            },
        };

        let url = format!("{API_BASE}/{MODEL}:generateContent");
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: GenerateContentResponse = response.json().await?;
        let text = body.text().ok_or(LlmError::EmptyContent)?;

        debug!("Gemini call succeeded: {} chars", text.len());
        Ok(text)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.api_key.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = EmbedContentRequest {
            model: format!("models/{EMBEDDING_MODEL}"),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };

        let url = format!("{API_BASE}/{EMBEDDING_MODEL}:embedContent");
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: EmbedContentResponse = response.json().await?;
        Ok(body.embedding.values)
    }
}
