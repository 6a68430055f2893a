use std::collections::BTreeMap;

use chrono::Local;
use log::debug;

use crate::config::{Config, ConflictPolicy};
use crate::error::{NoteError, Result};
use crate::vault::Vault;
use crate::{ExtractedData, GenerationResult};

/// Note file extension
pub const NOTE_EXT: &str = ".md";

const MAX_FILENAME_COMPONENT: usize = 120;

pub const DEFAULT_TEMPLATE: &str = "---\n\
title: {{title}}\n\
channel: {{channel}}\n\
url: {{video_url}}\n\
upload_date: {{upload_date}}\n\
duration: {{duration}}\n\
tags:\n\
{{tags}}\n\
created: {{extraction_date}}\n\
---\n\
\n\
# {{title}}\n\
\n\
## Summary\n\
\n\
{{summary}}\n\
\n\
## Key Points\n\
\n\
{{key_points}}\n\
\n\
## Questions\n\
\n\
{{questions}}\n\
\n\
## Transcript\n\
\n\
{{transcript}}\n\
\n\
{{hashtags}}\n";

/// Flat, write-once placeholder-to-value mapping for one extraction.
#[derive(Debug, Clone, Default)]
pub struct TemplateRecord {
    values: BTreeMap<String, String>,
}

impl TemplateRecord {
    fn insert(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }
}

fn gated(enabled: bool, value: String) -> String {
    if enabled { value } else { String::new() }
}

/// Build the substitution record from fetched data, generation output, and
/// the field toggles. Disabled fields map to empty strings, not missing keys.
pub fn build_record(data: &ExtractedData, generated: &GenerationResult, config: &Config) -> TemplateRecord {
    let meta = &data.metadata;
    let fields = &config.fields;
    let mut record = TemplateRecord::default();

    record.insert("title", gated(fields.title, meta.title.clone()));
    record.insert("video_url", meta.url.clone());
    record.insert("video_id", meta.video_id.clone());
    record.insert("channel", gated(fields.channel, meta.channel.clone()));
    record.insert("channel_url", gated(fields.channel, meta.channel_url.clone()));
    record.insert(
        "upload_date",
        gated(fields.upload_date, meta.upload_date.clone().unwrap_or_default()),
    );
    record.insert("duration", gated(fields.duration, meta.duration.clone()));
    record.insert("view_count", gated(fields.view_count, meta.view_count.clone()));
    record.insert("description", gated(fields.description, meta.description.clone()));
    record.insert("thumbnail", gated(fields.thumbnail, meta.thumbnail_url.clone()));
    record.insert("transcript", data.transcript.clone());

    record.insert("summary", generated.summary.clone().unwrap_or_default());
    record.insert(
        "key_points",
        generated.key_points.as_deref().map(format_bullets).unwrap_or_default(),
    );

    let tags: Vec<String> = generated
        .tags
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|t| sanitize_tag(t))
        .filter(|t| !t.is_empty())
        .collect();
    record.insert("tags", format_yaml_tags(&tags));
    record.insert("hashtags", format_hashtags(&tags));

    record.insert(
        "questions",
        generated.questions.as_deref().map(format_numbered).unwrap_or_default(),
    );
    record.insert("extraction_date", Local::now().format("%Y-%m-%d").to_string());

    record
}

/// Lowercase, strip non-word characters, turn internal whitespace into
/// single hyphens, trim leading/trailing hyphens.
pub fn sanitize_tag(tag: &str) -> String {
    let mut cleaned = String::new();
    for c in tag.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            cleaned.push(c);
        } else if c.is_whitespace() || c == '-' {
            cleaned.push('-');
        }
        // other punctuation dropped
    }
    cleaned.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-")
}

fn format_bullets(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

fn format_numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// YAML sequence block for the frontmatter `tags:` key.
fn format_yaml_tags(tags: &[String]) -> String {
    tags.iter().map(|t| format!("  - {t}")).collect::<Vec<_>>().join("\n")
}

fn format_hashtags(tags: &[String]) -> String {
    tags.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(" ")
}

/// Keys whose values are pre-formatted YAML blocks; they are substituted
/// into the frontmatter without scalar escaping. Their entries are already
/// sanitized down to word characters and hyphens.
const FRONTMATTER_BLOCK_KEYS: &[&str] = &["tags"];

/// Plain scalars that the YAML core schema would retype away from string:
/// booleans, nulls, and anything numeric-looking.
fn yaml_retypes_plain(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "null" | "~" | "yes" | "no" | "on" | "off" | ".nan" | ".inf" | "-.inf" | "+.inf"
    ) || value.parse::<f64>().is_ok()
        || (value.len() > 2 && (value.starts_with("0x") || value.starts_with("0o")))
}

fn needs_yaml_quoting(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value.chars().any(|c| matches!(c, ':' | '#' | '"' | '\'' | '\\' | '\n' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`'))
        || value.starts_with([' ', '-', '?'])
        || value.ends_with(' ')
        || yaml_retypes_plain(value)
}

/// Emit a value as a YAML scalar that re-parses to the original string for
/// any input: quoted with backslash/quote escaped and newlines encoded when
/// the plain form would be ambiguous.
fn escape_yaml_value(value: &str) -> String {
    if !needs_yaml_quoting(value) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
    format!("\"{escaped}\"")
}

/// Single-pass placeholder substitution. Substituted values are never
/// rescanned, so a value containing `{{...}}` cannot inject further
/// placeholders. Unmatched placeholders are left verbatim.
fn substitute(text: &str, record: &TemplateRecord, frontmatter: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = after[..close].trim();
                match record.get(key) {
                    Some(value) if frontmatter && !FRONTMATTER_BLOCK_KEYS.contains(&key) => {
                        out.push_str(&escape_yaml_value(value));
                    }
                    Some(value) => out.push_str(value),
                    None => {
                        // Unknown placeholder stays verbatim
                        out.push_str(&rest[open..open + 2 + close + 2]);
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split a template into its frontmatter region (between leading and
/// following `---` lines) and body. None when no delimiters are present.
fn split_frontmatter(template: &str) -> Option<(&str, &str)> {
    let mut lines = template.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    let mut offset = first.len();
    for line in lines {
        if line.trim_end() == "---" {
            let front = &template[first.len()..offset];
            let body = &template[offset + line.len()..];
            return Some((front, body));
        }
        offset += line.len();
    }
    None
}

/// Render a template against a record. Frontmatter values are escaped so
/// the rendered block parses as valid YAML for any input string; body
/// values are inserted as-is (single pass, no reinterpretation).
pub fn render(template: &str, record: &TemplateRecord) -> String {
    match split_frontmatter(template) {
        Some((front, body)) => {
            let front = substitute(front, record, true);
            let body = substitute(body, record, false);
            format!("---\n{front}---\n{body}")
        }
        None => substitute(template, record, false),
    }
}

/// Load the configured custom template through the vault, or fall back to
/// the built-in default.
pub fn load_template(vault: &dyn Vault, config: &Config) -> Result<String> {
    match &config.template_path {
        Some(path) => {
            debug!("Loading custom template: {path}");
            vault
                .read(path)
                .map_err(|e| NoteError::Template(format!("custom template {path}: {e}")))
        }
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Minimal document used when rendering fails: title, url, channel, and the
/// transcript.
pub fn fallback_note(data: &ExtractedData) -> String {
    let meta = &data.metadata;
    format!(
        "# {}\n\n- URL: {}\n- Channel: {}\n\n## Transcript\n\n{}\n",
        meta.title, meta.url, meta.channel, data.transcript
    )
}

fn sanitize_filename_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '[' | ']' | '^' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let trimmed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    trimmed.chars().take(MAX_FILENAME_COMPONENT).collect::<String>().trim().to_string()
}

/// Single-pass token substitution over the naming pattern. Substituted
/// values are never rescanned, so a token-shaped substring inside a title
/// or channel name stays verbatim.
fn substitute_pattern(pattern: &str, tokens: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    'scan: while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        for (token, value) in tokens {
            if candidate.starts_with(token) {
                out.push_str(value);
                rest = &candidate[token.len()..];
                continue 'scan;
            }
        }
        out.push('{');
        rest = &candidate[1..];
    }
    out.push_str(rest);
    out
}

/// Substitute the naming pattern's tokens and append the note extension.
pub fn generate_filename(record: &TemplateRecord, naming_pattern: &str) -> String {
    let title = sanitize_filename_component(record.get("title").unwrap_or(""));
    let channel = sanitize_filename_component(record.get("channel").unwrap_or(""));
    let date = record.get("extraction_date").unwrap_or("");
    let id = record.get("video_id").unwrap_or("");

    let stem = substitute_pattern(
        naming_pattern,
        &[
            ("{date}", date),
            ("{title}", &title),
            ("{channel}", &channel),
            ("{id}", id),
        ],
    );
    let stem = stem.trim();
    let stem = if stem.is_empty() { "Untitled" } else { stem };
    format!("{stem}{NOTE_EXT}")
}

/// Join folder and filename; no folder prefix when unset.
pub fn resolve_path(folder: &str, filename: &str) -> String {
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{filename}", folder.trim_end_matches('/'))
    }
}

fn split_extension(path: &str) -> (&str, &str) {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) => path.split_at(file_start + dot),
        None => (path, ""),
    }
}

/// Resolve a filename collision against the vault. Non-existent paths pass
/// through; "append" probes " 1", " 2", ... before the extension; "prompt"
/// returns the original path and leaves confirmation to the caller.
pub fn resolve_conflict(vault: &dyn Vault, path: &str, policy: ConflictPolicy) -> String {
    if !vault.exists(path) {
        return path.to_string();
    }
    match policy {
        ConflictPolicy::Prompt => path.to_string(),
        ConflictPolicy::Append => {
            let (stem, ext) = split_extension(path);
            let mut n = 1u32;
            loop {
                let candidate = format!("{stem} {n}{ext}");
                if !vault.exists(&candidate) {
                    return candidate;
                }
                n += 1;
            }
        }
    }
}
