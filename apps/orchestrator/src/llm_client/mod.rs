/// Generation client: the only place the orchestrator talks to a text-generation API.
///
/// Every backend implements [`GenerationBackend`]; the worker picks one at
/// startup through [`build_backend`] and shares it as `Arc<dyn GenerationBackend>`.
/// Schema-constrained calls go through [`generate_structured`], which turns a
/// malformed response into `LlmError::Parse` / `LlmError::Schema` so callers can
/// retry on the result tag instead of on panics.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{Config, LlmProvider};

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompts;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TRANSPORT_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response failed schema validation: {0}")]
    Schema(String),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("{0} API key not configured")]
    NotConfigured(&'static str),
}

impl LlmError {
    /// True when the backend answered but the answer did not fit the requested shape.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            LlmError::Parse(_) | LlmError::Schema(_) | LlmError::EmptyContent
        )
    }
}

/// A named JSON schema handed to the backend alongside a prompt.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

/// A type the pipeline can ask the backend to produce.
///
/// Deserialization enforces shape (every field required); `validate` enforces
/// value constraints serde cannot express.
pub trait StructuredOutput: DeserializeOwned {
    const NAME: &'static str;

    fn json_schema() -> Value;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn output_schema() -> OutputSchema {
        OutputSchema {
            name: Self::NAME,
            schema: Self::json_schema(),
        }
    }
}

/// Capability set shared by every text-generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the raw text of the completion. When `schema` is given the
    /// backend is asked for JSON matching it; parsing happens in the caller.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Embedding for `text`. Backends without embedding support return an empty vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Calls the backend with `T`'s schema and parses + validates the answer.
pub async fn generate_structured<T: StructuredOutput>(
    backend: &dyn GenerationBackend,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f32,
) -> Result<T, LlmError> {
    let schema = T::output_schema();
    let text = backend
        .generate(system_prompt, user_prompt, Some(&schema), temperature)
        .await?;
    parse_structured(&text)
}

/// Parses a JSON completion into `T`, tolerating Markdown code fences.
pub fn parse_structured<T: StructuredOutput>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }

    let value: T = serde_json::from_str(text)?;
    value.validate().map_err(LlmError::Schema)?;
    Ok(value)
}

/// Selects the backend named in the config.
pub fn build_backend(config: &Config) -> Arc<dyn GenerationBackend> {
    match config.llm_provider {
        LlmProvider::OpenAi => Arc::new(openai::OpenAiBackend::new(
            config.openai_api_key.clone(),
        )),
        LlmProvider::Gemini => Arc::new(gemini::GeminiBackend::new(
            config.gemini_api_key.clone(),
        )),
        LlmProvider::Anthropic => Arc::new(anthropic::AnthropicBackend::new(
            config.anthropic_api_key.clone(),
        )),
    }
}

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

/// Appends the JSON-only instruction and the schema to a system prompt.
pub(crate) fn with_schema_instruction(system_prompt: &str, schema: &OutputSchema) -> String {
    let schema_json =
        serde_json::to_string_pretty(&schema.schema).unwrap_or_else(|_| schema.schema.to_string());
    format!(
        "{system_prompt}\n\n{}\n\nThe JSON object ({}) MUST match this schema:\n{schema_json}",
        prompts::JSON_ONLY_SYSTEM,
        schema.name
    )
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Sends a request, retrying on 429 (rate limit) and 5xx with exponential backoff.
/// `build` is called once per attempt since a `RequestBuilder` is consumed on send.
pub(crate) async fn send_with_retry<F>(build: F) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..MAX_TRANSPORT_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "LLM call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(LlmError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            last_error = Some(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        return Ok(response);
    }

    Err(last_error.unwrap_or(LlmError::RateLimited {
        retries: MAX_TRANSPORT_RETRIES,
    }))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
