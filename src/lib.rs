pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod template;
pub mod vault;
pub mod youtube;

pub use error::{NoteError, Result};

use serde::Serialize;

/// Descriptive metadata scraped from a video's watch page
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub url: String,
    pub video_id: String,
    pub channel: String,
    pub upload_date: Option<String>,
    pub duration: String,
    pub view_count: String,
    pub description: String,
    pub channel_url: String,
    pub thumbnail_url: String,
}

impl VideoMetadata {
    /// Placeholder record used when the page scrape fails; metadata failure
    /// must never block transcript delivery.
    pub fn degraded(video_id: &str) -> Self {
        VideoMetadata {
            title: format!("YouTube Video {video_id}"),
            url: format!("https://www.youtube.com/watch?v={video_id}"),
            video_id: video_id.to_string(),
            channel: "Unknown".to_string(),
            upload_date: None,
            duration: "0:00".to_string(),
            view_count: "0".to_string(),
            description: String::new(),
            channel_url: String::new(),
            thumbnail_url: format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg"),
        }
    }
}

/// A single captioned segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Milliseconds from video start
    pub offset_ms: u64,
    pub duration_ms: u64,
}

/// Everything pulled from the video host for one extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedData {
    pub metadata: VideoMetadata,
    /// Segment texts joined by single spaces
    pub transcript: String,
    pub segments: Vec<TranscriptSegment>,
}

impl ExtractedData {
    pub fn new(metadata: VideoMetadata, segments: Vec<TranscriptSegment>) -> Self {
        let transcript = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        ExtractedData {
            metadata,
            transcript,
            segments,
        }
    }

    /// Degraded record used when the fetch fails under a lenient error policy.
    pub fn degraded(video_id: &str, transcript: &str) -> Self {
        ExtractedData {
            metadata: VideoMetadata::degraded(video_id),
            transcript: transcript.to_string(),
            segments: Vec::new(),
        }
    }
}

/// Output of a generation call. `None` means the section was not requested,
/// not that it failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationResult {
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub questions: Option<Vec<String>>,
}

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    // youtube.com/watch?v=ID
    if let Some(caps) = regex::Regex::new(r"(?:youtube\.com/watch\?.*v=)([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtu.be/ID
    if let Some(caps) = regex::Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/embed/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/shorts/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // Bare 11-character video ID
    if regex::Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap().is_match(input) {
        return Some(input.to_string());
    }

    None
}

pub fn is_valid_url(input: &str) -> bool {
    extract_video_id(input).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_shorts_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(extract_video_id("not-a-valid-id"), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=tooshort"), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("   \t  "), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(extract_video_id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_valid_url("just some text"));
    }

    #[test]
    fn test_extracted_data_joins_transcript() {
        let data = ExtractedData::new(
            VideoMetadata::degraded("dQw4w9WgXcQ"),
            vec![
                TranscriptSegment {
                    text: "Hello".to_string(),
                    offset_ms: 0,
                    duration_ms: 500,
                },
                TranscriptSegment {
                    text: "world".to_string(),
                    offset_ms: 500,
                    duration_ms: 500,
                },
            ],
        );
        assert_eq!(data.transcript, "Hello world");
    }

    #[test]
    fn test_degraded_metadata() {
        let meta = VideoMetadata::degraded("dQw4w9WgXcQ");
        assert_eq!(meta.title, "YouTube Video dQw4w9WgXcQ");
        assert_eq!(meta.channel, "Unknown");
        assert_eq!(meta.view_count, "0");
    }
}
