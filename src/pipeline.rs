use std::time::Duration;

use log::debug;

use crate::config::{Config, ErrorPolicy};
use crate::error::{NoteError, Result};
use crate::providers::Generator;
use crate::template;
use crate::vault::Vault;
use crate::youtube::SourceFetcher;
use crate::{ExtractedData, GenerationResult, extract_video_id};

/// Transcripts longer than this are cut before the generation call; the
/// full transcript still feeds the note body.
pub const MAX_GENERATION_CHARS: usize = 16_000;
pub const TRUNCATION_MARKER: &str = "\n\n[transcript truncated]";

/// Pipeline states, in run order. `Failed` is terminal and reachable from
/// any state under the "stop" policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    FetchingSource,
    Generating,
    Rendering,
    Writing,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Validating => "validating",
            Stage::FetchingSource => "fetching source",
            Stage::Generating => "generating",
            Stage::Rendering => "rendering",
            Stage::Writing => "writing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Receives stage-name updates as the pipeline advances.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, stage: Stage);
}

/// Receives user-visible messages: warnings for absorbed errors, plus one
/// terminal success/failure notification per run.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
    fn notify(&self, message: &str);
}

/// Retry an async operation with exponential backoff. Attempts run strictly
/// one after another; only the final failure is surfaced.
pub async fn retry<F, Fut, T>(max_attempts: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..max_attempts.max(1) {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap())
}

pub fn truncate_for_generation(transcript: &str) -> String {
    if transcript.chars().count() <= MAX_GENERATION_CHARS {
        return transcript.to_string();
    }
    let cut: String = transcript.chars().take(MAX_GENERATION_CHARS).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}

/// Sequences extraction, generation, templating, and the vault write,
/// applying the configured error policy at each stage.
pub struct Pipeline<'a> {
    config: &'a Config,
    fetcher: &'a dyn SourceFetcher,
    generator: &'a dyn Generator,
    vault: &'a dyn Vault,
    progress: &'a dyn ProgressSink,
    notifier: &'a dyn Notifier,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn SourceFetcher,
        generator: &'a dyn Generator,
        vault: &'a dyn Vault,
        progress: &'a dyn ProgressSink,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Pipeline {
            config,
            fetcher,
            generator,
            vault,
            progress,
            notifier,
        }
    }

    /// Run one extraction. Returns the vault-relative path of the created
    /// note. Emits exactly one terminal notification.
    pub async fn run(&self, input: &str) -> Result<String> {
        let result = self.run_inner(input).await;
        match &result {
            Ok(path) => {
                self.progress.stage(Stage::Done);
                self.notifier.notify(&format!("Note created: {path}"));
            }
            Err(e) => {
                self.progress.stage(Stage::Failed);
                self.notifier.notify(&format!("Extraction failed: {e}"));
            }
        }
        result
    }

    async fn run_inner(&self, input: &str) -> Result<String> {
        self.progress.stage(Stage::Validating);
        // Malformed input is always fatal; the error policy is not consulted
        let video_id = extract_video_id(input)
            .ok_or_else(|| NoteError::Validation(format!("could not extract a video ID from: {input}")))?;

        self.progress.stage(Stage::FetchingSource);
        let data = match retry(self.config.max_fetch_attempts, || self.fetcher.fetch(&video_id)).await {
            Ok(data) => data,
            Err(e) => match self.config.error_policy {
                ErrorPolicy::Stop => return Err(e),
                ErrorPolicy::Partial => {
                    self.notifier.warn(&format!("Source fetch failed, continuing without transcript: {e}"));
                    ExtractedData::degraded(&video_id, "")
                }
                ErrorPolicy::Skip => {
                    self.notifier.warn(&format!("Source fetch failed, marking transcript unavailable: {e}"));
                    ExtractedData::degraded(&video_id, &self.config.unavailable_marker)
                }
            },
        };

        self.progress.stage(Stage::Generating);
        let generated = if self.config.sections.any() {
            let prompt_transcript = truncate_for_generation(&data.transcript);
            match self.generator.generate_summary(&prompt_transcript).await {
                Ok(generated) => generated,
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::Stop => return Err(e),
                    _ => {
                        self.notifier.warn(&format!("Generation failed, continuing without summary: {e}"));
                        GenerationResult::default()
                    }
                },
            }
        } else {
            GenerationResult::default()
        };

        self.progress.stage(Stage::Rendering);
        let record = template::build_record(&data, &generated, self.config);
        // A broken custom template degrades to the fallback note, never fatal
        let content = match template::load_template(self.vault, self.config) {
            Ok(tpl) => template::render(&tpl, &record),
            Err(e) => {
                self.notifier.warn(&format!("Template unavailable, using fallback note: {e}"));
                template::fallback_note(&data)
            }
        };

        self.progress.stage(Stage::Writing);
        if !self.config.folder.is_empty() && !self.vault.exists(&self.config.folder) {
            self.vault.create_folder(&self.config.folder)?;
        }
        let filename = template::generate_filename(&record, &self.config.naming_pattern);
        let path = template::resolve_path(&self.config.folder, &filename);
        let path = template::resolve_conflict(self.vault, &path, self.config.conflict_policy);
        self.vault.create(&path, &content)?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::vault::mem::MemVault;
    use crate::{TranscriptSegment, VideoMetadata};

    struct StubFetcher {
        fail: bool,
    }

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        async fn fetch(&self, video_id: &str) -> Result<ExtractedData> {
            if self.fail {
                return Err(NoteError::Fetch("stub failure".to_string()));
            }
            let mut meta = VideoMetadata::degraded(video_id);
            meta.title = "Stub Video".to_string();
            meta.channel = "Stub Channel".to_string();
            Ok(ExtractedData::new(
                meta,
                vec![TranscriptSegment {
                    text: "stub transcript text".to_string(),
                    offset_ms: 0,
                    duration_ms: 1000,
                }],
            ))
        }
    }

    struct StubGenerator {
        fail: bool,
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate_summary(&self, _transcript: &str) -> Result<GenerationResult> {
            if self.fail {
                return Err(NoteError::Generation {
                    status: 500,
                    body: "stub failure".to_string(),
                });
            }
            Ok(GenerationResult {
                summary: Some("A stub summary.".to_string()),
                key_points: None,
                tags: Some(vec!["stub".to_string()]),
                questions: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<Stage>>,
    }

    impl ProgressSink for RecordingProgress {
        fn stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        warnings: Mutex<Vec<String>>,
        notifications: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn warn(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }

        fn notify(&self, message: &str) {
            self.notifications.lock().unwrap().push(message.to_string());
        }
    }

    fn test_config(policy: ErrorPolicy) -> Config {
        let mut config = Config::default();
        config.error_policy = policy;
        // One attempt keeps tests free of backoff sleeps
        config.max_fetch_attempts = 1;
        config
    }

    struct Harness {
        vault: MemVault,
        progress: RecordingProgress,
        notifier: RecordingNotifier,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                vault: MemVault::default(),
                progress: RecordingProgress::default(),
                notifier: RecordingNotifier::default(),
            }
        }

        async fn run(&self, config: &Config, fetcher: &StubFetcher, generator: &StubGenerator, input: &str) -> Result<String> {
            Pipeline::new(config, fetcher, generator, &self.vault, &self.progress, &self.notifier)
                .run(input)
                .await
        }
    }

    #[tokio::test]
    async fn test_happy_path_stage_sequence() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Stop);
        let path = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(path, "Stub Video.md");
        let content = h.vault.read(&path).unwrap();
        assert!(content.contains("A stub summary."));
        assert!(content.contains("stub transcript text"));

        let stages = h.progress.stages.lock().unwrap().clone();
        assert_eq!(
            stages,
            vec![
                Stage::Validating,
                Stage::FetchingSource,
                Stage::Generating,
                Stage::Rendering,
                Stage::Writing,
                Stage::Done,
            ]
        );
        assert!(h.notifier.warnings.lock().unwrap().is_empty());
        assert_eq!(h.notifier.notifications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_fatal_even_under_skip() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Skip);
        let err = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: false }, "not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Validation(_)));
        assert!(h.vault.files.lock().unwrap().is_empty());

        let stages = h.progress.stages.lock().unwrap().clone();
        assert_eq!(stages.last(), Some(&Stage::Failed));
    }

    #[tokio::test]
    async fn test_fetch_failure_stop_policy_is_fatal() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Stop);
        let err = h
            .run(&config, &StubFetcher { fail: true }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Fetch(_)));
        assert!(h.vault.files.lock().unwrap().is_empty());
        // One terminal notification, no warnings
        assert!(h.notifier.warnings.lock().unwrap().is_empty());
        assert_eq!(h.notifier.notifications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skip_policy_writes_unavailable_marker() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Skip);
        let path = h
            .run(&config, &StubFetcher { fail: true }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap();

        let content = h.vault.read(&path).unwrap();
        assert!(content.contains("Transcript unavailable."));

        let stages = h.progress.stages.lock().unwrap().clone();
        assert!(stages.contains(&Stage::Writing));
        // Exactly one warning plus one terminal notification
        assert_eq!(h.notifier.warnings.lock().unwrap().len(), 1);
        assert_eq!(h.notifier.notifications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_partial_policy_empty_transcript() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Partial);
        let path = h
            .run(&config, &StubFetcher { fail: true }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap();
        let content = h.vault.read(&path).unwrap();
        assert!(!content.contains("Transcript unavailable."));
        assert_eq!(h.notifier.warnings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_absorbed_under_partial() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Partial);
        let path = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: true }, "dQw4w9WgXcQ")
            .await
            .unwrap();
        let content = h.vault.read(&path).unwrap();
        assert!(!content.contains("A stub summary."));
        assert!(content.contains("stub transcript text"));
        assert_eq!(h.notifier.warnings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_stop_policy_is_fatal() {
        let h = Harness::new();
        let config = test_config(ErrorPolicy::Stop);
        let err = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: true }, "dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Generation { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_missing_custom_template_degrades_to_fallback() {
        let h = Harness::new();
        let mut config = test_config(ErrorPolicy::Stop);
        config.template_path = Some("Templates/missing.md".to_string());
        let path = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap();
        let content = h.vault.read(&path).unwrap();
        assert!(content.starts_with("# Stub Video"));
        assert!(content.contains("stub transcript text"));
        assert_eq!(h.notifier.warnings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_folder_created_and_conflict_resolved() {
        let h = Harness::new();
        let mut config = test_config(ErrorPolicy::Stop);
        config.folder = "Videos".to_string();
        h.vault.create("Videos/Stub Video.md", "existing").unwrap();

        let path = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(path, "Videos/Stub Video 1.md");
        assert_eq!(h.vault.read("Videos/Stub Video.md").unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let h = Harness::new();
        let mut config = test_config(ErrorPolicy::Skip);
        // Prompt policy returns the occupied path, so the create collides
        config.conflict_policy = crate::config::ConflictPolicy::Prompt;
        h.vault.create("Stub Video.md", "existing").unwrap();

        let err = h
            .run(&config, &StubFetcher { fail: false }, &StubGenerator { fail: false }, "dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Write(_)));
    }

    #[tokio::test]
    async fn test_retry_surfaces_final_failure_only() {
        let attempts = Mutex::new(0u32);
        let result: Result<()> = retry(3, || {
            *attempts.lock().unwrap() += 1;
            async { Err(NoteError::Fetch("always".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let attempts = Mutex::new(0u32);
        let result = retry(3, || {
            let n = {
                let mut guard = attempts.lock().unwrap();
                *guard += 1;
                *guard
            };
            async move {
                if n < 2 {
                    Err(NoteError::Fetch("flaky".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_truncate_for_generation() {
        let short = "short transcript";
        assert_eq!(truncate_for_generation(short), short);

        let long = "x".repeat(MAX_GENERATION_CHARS + 100);
        let truncated = truncate_for_generation(&long);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), MAX_GENERATION_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::FetchingSource.to_string(), "fetching source");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
