pub mod anthropic;
pub mod lmstudio;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use log::{debug, info};

use crate::GenerationResult;
use crate::config::{Config, Sections};
use crate::error::{NoteError, Result};

pub use anthropic::AnthropicProvider;
pub use lmstudio::LmStudioProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes video transcripts. \
Start every requested section with its name followed by a colon on its own line \
(for example \"Summary:\" or \"Tags:\"), and separate sections with a blank line. \
Write key points and questions as one item per line, and tags as a comma-separated list.";

/// One text-generation backend. Adapters differ only in endpoint, request
/// body shape, auth convention, and where the generated text lives in the
/// response.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Health probe. Internal failures become `false`, never an error.
    async fn test_connection(&self) -> bool;

    /// Send one prompt and return the raw generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Turn a non-success generation response into `NoteError::Generation`
/// carrying the status and body, otherwise parse the JSON body.
pub(crate) async fn json_or_generation_error(resp: reqwest::Response) -> Result<serde_json::Value> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(NoteError::Generation { status, body });
    }
    Ok(resp.json().await?)
}

/// Concatenate the system prompt, the transcript, and a trailing instruction
/// naming exactly the enabled sections, in fixed order.
pub fn build_prompt(system_prompt: &str, transcript: &str, sections: &Sections) -> String {
    let mut requested = Vec::new();
    if sections.summary {
        requested.push("summary");
    }
    if sections.key_points {
        requested.push("key points");
    }
    if sections.tags {
        requested.push("tags");
    }
    if sections.questions {
        requested.push("questions");
    }
    format!(
        "{system_prompt}\n\nTranscript:\n{transcript}\n\nPlease provide: {}",
        requested.join(", ")
    )
}

/// Locate a labeled block in the raw response: case-insensitive "label:"
/// search, bounded by a blank line or end of text.
fn extract_block<'a>(raw: &'a str, label: &str) -> Option<&'a str> {
    let re = regex::RegexBuilder::new(&format!(r"{}\s*:", regex::escape(label)))
        .case_insensitive(true)
        .build()
        .ok()?;
    let rest = &raw[re.find(raw)?.end()..];
    let end = rest.find("\n\n").unwrap_or(rest.len());
    let block = rest[..end].trim();
    if block.is_empty() { None } else { Some(block) }
}

/// Split a list block into entries: one per line, bullet markers and list
/// numbering stripped, empties dropped.
fn parse_list(block: &str) -> Vec<String> {
    let numbering = regex::Regex::new(r"^\d+[.)]\s*").unwrap();
    block
        .lines()
        .map(|line| {
            let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
            numbering.replace(line, "").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// A tag block with no newlines is comma-separated.
fn parse_tags(block: &str) -> Vec<String> {
    if block.contains('\n') {
        parse_list(block)
    } else {
        block
            .split(',')
            .map(|t| t.trim().trim_start_matches('#').trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Shared response-text parser: pull each enabled section out of the raw
/// generated text. Disabled sections stay `None` (not requested).
pub fn parse_sections(raw: &str, sections: &Sections) -> GenerationResult {
    let mut result = GenerationResult::default();
    if sections.summary {
        result.summary = extract_block(raw, "summary").map(|b| b.to_string());
    }
    if sections.key_points {
        result.key_points = extract_block(raw, "key points").map(parse_list);
    }
    if sections.tags {
        result.tags = extract_block(raw, "tags").map(parse_tags);
    }
    if sections.questions {
        result.questions = extract_block(raw, "questions").map(parse_list);
    }
    result
}

/// Pipeline-facing seam over the generation layer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_summary(&self, transcript: &str) -> Result<GenerationResult>;
}

/// Resolves the configured provider to an adapter and delegates generation
/// to it.
pub struct GenerationService {
    provider: Box<dyn Provider>,
    system_prompt: String,
    sections: Sections,
}

impl GenerationService {
    /// Build the service from configuration. With provider "custom" and
    /// auto-detection enabled, probes the fixed local-provider order and
    /// adopts the first that answers; keeps the default adapter when none
    /// do. Detection runs once per process.
    pub async fn from_config(config: &Config, client: reqwest::Client, probe_client: reqwest::Client) -> Self {
        let mut provider = resolve_provider(&config.provider, config, &client, &probe_client);

        if config.provider == "custom" && config.auto_detect {
            let candidates: Vec<Box<dyn Provider>> = vec![
                Box::new(OllamaProvider::new(
                    client.clone(),
                    probe_client.clone(),
                    &config.providers.ollama,
                )),
                Box::new(LmStudioProvider::new(
                    client.clone(),
                    probe_client.clone(),
                    &config.providers.lmstudio,
                )),
            ];
            for candidate in candidates {
                if candidate.test_connection().await {
                    info!("Auto-detected local provider: {}", candidate.name());
                    provider = candidate;
                    break;
                }
            }
        }

        debug!("Active generation provider: {}", provider.name());
        GenerationService {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            sections: config.sections,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

#[async_trait]
impl Generator for GenerationService {
    async fn generate_summary(&self, transcript: &str) -> Result<GenerationResult> {
        let prompt = build_prompt(&self.system_prompt, transcript, &self.sections);
        let raw = self.provider.complete(&prompt).await?;
        Ok(parse_sections(&raw, &self.sections))
    }
}

fn resolve_provider(
    name: &str,
    config: &Config,
    client: &reqwest::Client,
    probe_client: &reqwest::Client,
) -> Box<dyn Provider> {
    let provider_config = config.providers.get(name);
    match name {
        "lmstudio" => Box::new(LmStudioProvider::new(client.clone(), probe_client.clone(), provider_config)),
        "openai" => Box::new(OpenAiProvider::new(client.clone(), probe_client.clone(), provider_config)),
        "anthropic" => Box::new(AnthropicProvider::new(client.clone(), probe_client.clone(), provider_config)),
        // "ollama", and the starting point for "custom" before detection
        _ => Box::new(OllamaProvider::new(client.clone(), probe_client.clone(), provider_config)),
    }
}
