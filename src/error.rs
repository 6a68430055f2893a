use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("source fetch failed: {0}")]
    Fetch(String),

    #[error("generation request failed with status {status}: {body}")]
    Generation { status: u16, body: String },

    #[error("no API key configured for provider {provider} (set it in config or the {env_var} environment variable)")]
    MissingApiKey { provider: String, env_var: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NoteError>;
