use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubenote",
    about = "Turn YouTube videos into summarized Markdown notes in your vault",
    version
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Vault root directory notes are written into
    #[arg(long, default_value = ".")]
    pub vault: PathBuf,

    /// Vault-relative folder for new notes (overrides config)
    #[arg(short, long)]
    pub folder: Option<String>,

    /// Generation provider: ollama, lmstudio, openai, anthropic, custom
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model identifier for the selected provider
    #[arg(long)]
    pub model: Option<String>,

    /// Preferred caption language
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Vault-relative path of a custom note template
    #[arg(short, long)]
    pub template: Option<String>,

    /// Skip generation and write transcript-only notes
    #[arg(long)]
    pub no_generation: bool,

    /// Show pipeline progress on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
