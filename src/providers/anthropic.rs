use async_trait::async_trait;
use log::debug;

use super::{Provider, json_or_generation_error};
use crate::config::ProviderConfig;
use crate::error::{NoteError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

/// Hosted Anthropic API. Messages shape with provider-specific headers, key
/// required.
pub struct AnthropicProvider {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, probe_client: reqwest::Client, config: &ProviderConfig) -> Self {
        AnthropicProvider {
            client,
            probe_client,
            endpoint: config.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: config.api_key.clone().or_else(|| std::env::var(API_KEY_ENV).ok()),
        }
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| NoteError::MissingApiKey {
            provider: "anthropic".to_string(),
            env_var: API_KEY_ENV.to_string(),
        })
    }
}

fn request_body(model: &str, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "max_tokens": 4096,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    })
}

fn extract_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Err(NoteError::Generation {
        status: 200,
        body: "unexpected Anthropic response format".to_string(),
    })
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn test_connection(&self) -> bool {
        let Some(key) = self.api_key.as_deref() else {
            return false;
        };
        let url = format!("{}/v1/models", self.endpoint);
        match self
            .probe_client
            .get(&url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let key = self.require_key()?;
        let url = format!("{}/v1/messages", self.endpoint);
        debug!("Generating via Anthropic API with model {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request_body(&self.model, prompt))
            .send()
            .await?;

        let json = json_or_generation_error(resp).await?;
        extract_text(&json)
    }
}
