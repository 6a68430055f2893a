use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

/// Which stages the pipeline keeps running through after an absorbed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Any fetch/generation failure ends the run
    Stop,
    /// Continue with degraded data and an empty transcript
    Partial,
    /// Continue with degraded data and an "unavailable" transcript marker
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Probe " 1", " 2", ... suffixes until an unused path is found
    Append,
    /// Hand the original path back to the caller for confirmation
    Prompt,
}

/// Which generation output sections are requested.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct Sections {
    pub summary: bool,
    pub key_points: bool,
    pub tags: bool,
    pub questions: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Sections {
            summary: true,
            key_points: true,
            tags: true,
            questions: false,
        }
    }
}

impl Sections {
    pub fn any(&self) -> bool {
        self.summary || self.key_points || self.tags || self.questions
    }
}

/// Per-metadata-field placeholder toggles. A disabled field still renders
/// its placeholder key, as an empty string.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct Fields {
    pub title: bool,
    pub channel: bool,
    pub upload_date: bool,
    pub duration: bool,
    pub view_count: bool,
    pub description: bool,
    pub thumbnail: bool,
}

impl Default for Fields {
    fn default() -> Self {
        Fields {
            title: true,
            channel: true,
            upload_date: true,
            duration: true,
            view_count: true,
            description: true,
            thumbnail: true,
        }
    }
}

/// Endpoint/model/credential override for one generation backend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama: ProviderConfig,
    pub lmstudio: ProviderConfig,
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, name: &str) -> &ProviderConfig {
        match name {
            "lmstudio" => &self.lmstudio,
            "openai" => &self.openai,
            "anthropic" => &self.anthropic,
            _ => &self.ollama,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// "ollama" | "lmstudio" | "openai" | "anthropic" | "custom"
    pub provider: String,
    /// Probe local providers when `provider` is "custom"
    pub auto_detect: bool,
    pub providers: ProvidersConfig,
    /// Preferred caption language code
    pub preferred_lang: String,
    pub max_fetch_attempts: u32,
    /// Timeout for generation requests, in seconds
    pub timeout_secs: u64,
    pub sections: Sections,
    pub fields: Fields,
    pub system_prompt: Option<String>,
    /// Vault-relative path of a custom note template
    pub template_path: Option<String>,
    /// Vault-relative folder notes are written into ("" = vault root)
    pub folder: String,
    /// Filename pattern with {date}, {title}, {channel}, {id} tokens
    pub naming_pattern: String,
    pub conflict_policy: ConflictPolicy,
    pub error_policy: ErrorPolicy,
    /// Transcript body used under the "skip" error policy
    pub unavailable_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "ollama".to_string(),
            auto_detect: true,
            providers: ProvidersConfig::default(),
            preferred_lang: "en".to_string(),
            max_fetch_attempts: 3,
            timeout_secs: 120,
            sections: Sections::default(),
            fields: Fields::default(),
            system_prompt: None,
            template_path: None,
            folder: String::new(),
            naming_pattern: "{title}".to_string(),
            conflict_policy: ConflictPolicy::Append,
            error_policy: ErrorPolicy::Partial,
            unavailable_marker: "Transcript unavailable.".to_string(),
        }
    }
}

impl Config {
    /// Load config from ~/.config/tubenote/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("tubenote")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
provider = "anthropic"
preferred_lang = "es"
folder = "Videos"
naming_pattern = "{date} {title}"
conflict_policy = "prompt"
error_policy = "skip"

[providers.anthropic]
model = "claude-sonnet-4-6"
api_key = "sk-test"

[sections]
questions = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.preferred_lang, "es");
        assert_eq!(config.folder, "Videos");
        assert_eq!(config.conflict_policy, ConflictPolicy::Prompt);
        assert_eq!(config.error_policy, ErrorPolicy::Skip);
        assert_eq!(config.providers.anthropic.model.as_deref(), Some("claude-sonnet-4-6"));
        assert!(config.sections.questions);
        // Untouched sections keep their defaults
        assert!(config.sections.summary);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.provider, "ollama");
        assert!(config.auto_detect);
        assert_eq!(config.max_fetch_attempts, 3);
        assert_eq!(config.error_policy, ErrorPolicy::Partial);
        assert_eq!(config.naming_pattern, "{title}");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(r#"preferred_lang = "fr""#).unwrap();
        assert_eq!(config.preferred_lang, "fr");
        assert_eq!(config.provider, "ollama");
    }

    #[test]
    fn test_providers_lookup() {
        let mut config = Config::default();
        config.providers.openai.model = Some("gpt-4o".to_string());
        assert_eq!(config.providers.get("openai").model.as_deref(), Some("gpt-4o"));
        assert!(config.providers.get("ollama").model.is_none());
    }
}
