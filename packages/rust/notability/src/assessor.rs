//! Text-assessment collaborator and its OpenRouter chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use entitygraph_shared::{AppConfig, EntityGraphError, Result, resolve_secret};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Answers a free-text prompt. Output may be wrapped in code fences.
#[async_trait]
pub trait TextAssessor: Send + Sync {
    async fn assess(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// OpenRouterClient
// ---------------------------------------------------------------------------

/// OpenRouter (OpenAI-compatible) chat completions client.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Entitygraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EntityGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from `[openrouter]`, reading the key from the env var it names.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.openrouter.api_key_env, "OpenRouter API key")?;
        Self::new(
            api_key,
            config.openrouter.default_model.clone(),
            config.openrouter.base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextAssessor for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn assess(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EntityGraphError::Assessment(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EntityGraphError::Assessment(format!(
                "OpenRouter returned HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EntityGraphError::Assessment(format!("malformed response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EntityGraphError::Assessment("response had no choices".into()))?;

        debug!(chars = content.len(), "assessment received");
        Ok(content)
    }
}
