//! OpenAI-compatible chat completions client
//!
//! Works with OpenRouter (default), Fireworks, or any endpoint exposing
//! `POST {base_url}/chat/completions`.

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::generate::{GenerationContext, TextGenerator, prompt};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Connection settings for a chat completions endpoint
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// API root, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Completion token cap
    pub max_tokens: u32,
}

impl GeneratorSettings {
    /// Resolve settings from config, reading the API key from the environment
    pub fn from_config(config: &GenerationConfig, model: Option<&str>) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set; export an API key for {}",
                    config.api_key_env, config.base_url
                ))
            })?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or(&config.model).to_string(),
            api_key,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`TextGenerator`] backed by a chat completions API
pub struct ChatCompletionsGenerator {
    client: Client,
    settings: GeneratorSettings,
}

impl ChatCompletionsGenerator {
    /// Create a generator
    pub fn new(settings: GeneratorSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent("auto-pr")
            .build()
            .map_err(|e| Error::GenerationFailed(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Model in use
    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, context: &GenerationContext) -> Result<String> {
        let prompt = prompt::build(context);
        debug!(
            model = %self.settings.model,
            kind = %context.kind,
            feedback = context.feedback.len(),
            "requesting completion"
        );

        let body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .header("X-Title", "auto-pr")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::GenerationFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::GenerationFailed(format!(
                "API returned {status}: {}",
                text.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationFailed(format!("unexpected response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}
