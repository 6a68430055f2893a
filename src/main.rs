use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use eyre::{Result, bail};
use log::info;

mod cli;

use cli::Cli;
use tubenote::config::{Config, ProviderConfig, Sections};
use tubenote::pipeline::{Notifier, Pipeline, ProgressSink, Stage};
use tubenote::providers::GenerationService;
use tubenote::vault::FsVault;
use tubenote::youtube::YoutubeFetcher;

/// Fixed short timeout for provider health probes
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("tubenote.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubenote")
        .join("logs")
}

struct ConsoleProgress {
    verbose: bool,
}

impl ProgressSink for ConsoleProgress {
    fn stage(&self, stage: Stage) {
        log::debug!("Pipeline stage: {stage}");
        if self.verbose {
            eprintln!("[{stage}]");
        }
    }
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
        eprintln!("warning: {message}");
    }

    fn notify(&self, message: &str) {
        log::info!("{message}");
        println!("{message}");
    }
}

fn provider_config_mut<'a>(config: &'a mut Config, name: &str) -> &'a mut ProviderConfig {
    match name {
        "lmstudio" => &mut config.providers.lmstudio,
        "openai" => &mut config.providers.openai,
        "anthropic" => &mut config.providers.anthropic,
        _ => &mut config.providers.ollama,
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref provider) = cli.provider {
        config.provider = provider.clone();
    }
    if let Some(ref model) = cli.model {
        let name = config.provider.clone();
        provider_config_mut(config, &name).model = Some(model.clone());
    }
    if let Some(ref lang) = cli.lang {
        config.preferred_lang = lang.clone();
    }
    if let Some(ref folder) = cli.folder {
        config.folder = folder.clone();
    }
    if let Some(ref template) = cli.template {
        config.template_path = Some(template.clone());
    }
    if cli.no_generation {
        config.sections = Sections {
            summary: false,
            key_points: false,
            tags: false,
            questions: false,
        };
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();

    // Load config file (non-fatal if missing/invalid)
    let mut config = Config::load().unwrap_or_default();
    apply_overrides(&mut config, &cli);

    if cli.verbose {
        let config_path = tubenote::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Provider: {}", config.provider);
        eprintln!("Vault: {}", cli.vault.display());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let probe_client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

    let fetcher = YoutubeFetcher::new(client.clone(), config.preferred_lang.clone());
    let service = GenerationService::from_config(&config, client, probe_client).await;
    if cli.verbose {
        eprintln!("Active provider: {}", service.provider_name());
    }
    let vault = FsVault::new(&cli.vault);
    let progress = ConsoleProgress { verbose: cli.verbose };
    let notifier = ConsoleNotifier;

    // Collect URLs: from arg or stdin
    let inputs = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if inputs.iter().all(|i| i.trim().is_empty()) {
        bail!("no URL or video ID provided\n\nUsage: tubenote <URL>\n       echo <URL> | tubenote");
    }

    let pipeline = Pipeline::new(&config, &fetcher, &service, &vault, &progress, &notifier);

    let mut failures = 0usize;
    for input in &inputs {
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if pipeline.run(input).await.is_err() {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} extraction(s) failed");
    }
    Ok(())
}
