use std::time::Duration;

use anyhow::{Context, Result};

/// Deployment environment. Drives the default poll interval and log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Which generation backend the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Anthropic,
}

impl LlmProvider {
    /// Unknown names fall back to OpenAI.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" => LlmProvider::Gemini,
            "anthropic" | "claude" => LlmProvider::Anthropic,
            _ => LlmProvider::OpenAi,
        }
    }
}

/// Orchestrator configuration, built once at startup and handed to every
/// component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub environment: Environment,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub stale_task_timeout: Duration,
    pub llm_provider: LlmProvider,
    pub openai_api_key: String,
    pub gemini_api_key: String,
    pub anthropic_api_key: String,
    pub enable_embedding_score: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match var("ENVIRONMENT").as_deref().map(str::trim) {
            Some("production") => Environment::Production,
            Some("development") | Some("") | None => Environment::Development,
            Some(other) => anyhow::bail!(
                "ENVIRONMENT must be 'development' or 'production', got '{other}'"
            ),
        };

        let default_poll = match environment {
            Environment::Development => 2,
            Environment::Production => 5,
        };

        Ok(Config {
            database_url: var("DATABASE_URL")
                .context("Required environment variable 'DATABASE_URL' is not set")?,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 5)?,
            environment,
            poll_interval: Duration::from_secs(parse_or(&var, "POLL_INTERVAL_SECS", default_poll)?),
            error_backoff: Duration::from_secs(parse_or(&var, "ERROR_BACKOFF_SECS", 5)?),
            stale_task_timeout: Duration::from_secs(parse_or(
                &var,
                "STALE_TASK_TIMEOUT_SECS",
                900,
            )?),
            llm_provider: LlmProvider::parse(&var("LLM_PROVIDER").unwrap_or_default()),
            openai_api_key: var("OPENAI_API_KEY").unwrap_or_default(),
            gemini_api_key: var("GEMINI_API_KEY").unwrap_or_default(),
            anthropic_api_key: var("ANTHROPIC_API_KEY").unwrap_or_default(),
            enable_embedding_score: parse_flag(var("ENABLE_EMBEDDING_SCORE").as_deref()),
            port: parse_or(&var, "PORT", 8001)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
