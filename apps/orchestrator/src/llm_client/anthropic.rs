//! Anthropic Messages API backend. Anthropic has no embeddings endpoint, so
//! `embed` always yields an empty vector and scoring degrades to zero.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, send_with_retry, with_schema_instruction, GenerationBackend, LlmError, OutputSchema};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("Anthropic"));
        }

        let system = match schema {
            Some(schema) => with_schema_instruction(system_prompt, schema),
            None => system_prompt.to_string(),
        };

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &system,
            temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        let response = send_with_retry(|| {
            self.client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
        })
        .await?;

        let body: AnthropicResponse = response.json().await?;

        debug!(
            "Anthropic call succeeded: input_tokens={}, output_tokens={}",
            body.usage.input_tokens, body.usage.output_tokens
        );

        body.text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(Vec::new())
    }
}
