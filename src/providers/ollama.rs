use async_trait::async_trait;
use log::debug;

use super::{Provider, json_or_generation_error};
use crate::config::ProviderConfig;
use crate::error::{NoteError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Local Ollama daemon. Single-prompt request shape, no authentication.
pub struct OllamaProvider {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(client: reqwest::Client, probe_client: reqwest::Client, config: &ProviderConfig) -> Self {
        OllamaProvider {
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
        "prompt": prompt,
        "stream": false
    })
}

fn extract_text(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| NoteError::Generation {
            status: 200,
            body: "unexpected Ollama response format".to_string(),
        })
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.probe_client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!("Generating via Ollama at {url} with model {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body(&self.model, prompt))
            .send()
            .await?;

        let json = json_or_generation_error(resp).await?;
        extract_text(&json)
    }
}
