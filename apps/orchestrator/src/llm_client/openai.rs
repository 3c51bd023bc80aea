//! OpenAI chat completions + embeddings backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{http_client, send_with_retry, with_schema_instruction, GenerationBackend, LlmError, OutputSchema};

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
pub const MODEL: &str = "gpt-4o";
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("OpenAI"));
        }

        let system = match schema {
            Some(schema) => with_schema_instruction(system_prompt, schema),
            None => system_prompt.to_string(),
        };

        let request_body = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            response_format: schema.map(|_| json!({"type": "json_object"})),
        };

        let response = send_with_retry(|| {
            self.client
                .post(CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!("OpenAI call succeeded: {} chars", content.len());

        if schema.is_some() && content.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.api_key.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = EmbeddingRequest {
            input: text,
            model: EMBEDDING_MODEL,
        };

        let response = send_with_retry(|| {
            self.client
                .post(EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: EmbeddingResponse = response.json().await?;
        Ok(body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default())
    }
}
