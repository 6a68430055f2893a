use async_trait::async_trait;
use log::debug;

use super::{Provider, json_or_generation_error};
use crate::config::ProviderConfig;
use crate::error::{NoteError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234";
pub const DEFAULT_MODEL: &str = "local-model";

/// Local LM Studio server. Speaks the OpenAI chat-completions shape, no
/// authentication.
pub struct LmStudioProvider {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl LmStudioProvider {
    pub fn new(client: reqwest::Client, probe_client: reqwest::Client, config: &ProviderConfig) -> Self {
        LmStudioProvider {
            client,
            probe_client,
            endpoint: config.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

fn request_body(model: &str, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    })
}

pub(crate) fn extract_chat_text(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| NoteError::Generation {
            status: 200,
            body: "unexpected chat-completions response format".to_string(),
        })
}

#[async_trait]
impl Provider for LmStudioProvider {
    fn name(&self) -> &'static str {
        "lmstudio"
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/v1/models", self.endpoint);
        match self.probe_client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!("Generating via LM Studio at {url} with model {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body(&self.model, prompt))
            .send()
            .await?;

        let json = json_or_generation_error(resp).await?;
        extract_chat_text(&json)
    }
}
