//! OpenAI-compatible [`LLMProvider`] implementation.
//!
//! Calls `POST {base_url}/chat/completions` with retry and backoff, using
//! the same strategy as [`crate::embedding::OpenAiEmbeddingClient`]:
//! - HTTP 429 / 5xx → retry with exponential backoff (1s, 2s, 4s, ... 32s)
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use graphql_gen_core::llm::{normalize_messages, CompletionOptions, LLMProvider, Message, Role};

use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl OpenAiChatProvider {
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| anyhow::anyhow!("llm.model required for the openai provider"))?;
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            client,
            max_retries: config.max_retries,
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LLMProvider for OpenAiChatProvider {
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> anyhow::Result<String> {
        let normalized = normalize_messages(messages);
        let payload_messages: Vec<serde_json::Value> = normalized
            .iter()
            .map(|m| serde_json::json!({"role": role_str(m.role), "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": payload_messages,
        });
        let temperature = options.temperature.or(self.default_temperature);
        let max_tokens = options.max_tokens.or(self.default_max_tokens);
        if let Some(t) = temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(mt) = max_tokens {
            body["max_tokens"] = serde_json::json!(mt);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM request failed after retries")))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("invalid LLM response: missing choices[0].message.content"))
}

/// Create the [`LLMProvider`] for the configured provider.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Box<dyn LLMProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChatProvider::new(config)?)),
        other => bail!("Unknown LLM provider: {}", other),
    }
}
