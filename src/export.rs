//! Markdown export of a conversation, and the reader for the same format.

use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::transcript::{ChatMessage, ChatRole};

const TITLE: &str = "# Synthara Chat Session";
const SYSTEM_HEADING: &str = "## System Instructions";
const CONVERSATION_HEADING: &str = "## Conversation";
const FOOTER: &str = "---\nGenerated by Synthara - A terminal-based LLM interface\n";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no file path given")]
    EmptyPath,

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `$HOME/chat_export.md`, or `./chat_export.md` without a home directory.
pub fn default_export_path() -> String {
    dirs::home_dir()
        .map(|home| home.join("chat_export.md"))
        .unwrap_or_else(|| PathBuf::from("./chat_export.md"))
        .display()
        .to_string()
}

pub fn render_markdown<Tz: TimeZone>(messages: &[ChatMessage], timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut markdown = String::new();

    markdown.push_str(TITLE);
    markdown.push_str("\n\n");
    markdown.push_str(&format!("Date: {}\n\n", timestamp.format("%Y-%m-%d %H:%M:%S")));

    if let Some(system) = messages.iter().find(|m| m.role == ChatRole::System) {
        markdown.push_str(SYSTEM_HEADING);
        markdown.push_str("\n\n");
        markdown.push_str(&system.content);
        markdown.push_str("\n\n");
    }

    markdown.push_str(CONVERSATION_HEADING);
    markdown.push_str("\n\n");

    for message in messages.iter().filter(|m| m.role != ChatRole::System) {
        let heading = match message.role {
            ChatRole::User => "### User",
            ChatRole::Assistant => "### Assistant",
            ChatRole::System => continue,
        };
        markdown.push_str(heading);
        markdown.push_str("\n\n");
        markdown.push_str(&message.content);
        markdown.push_str("\n\n");
    }

    markdown.push_str(FOOTER);
    markdown
}

pub fn write_markdown(messages: &[ChatMessage], path: &str) -> Result<(), ExportError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ExportError::EmptyPath);
    }
    let path = Path::new(path);
    let io_err = |source| ExportError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, render_markdown(messages, &Local::now())).map_err(io_err)?;

    info!(path = %path.display(), messages = messages.len(), "conversation exported");
    Ok(())
}

#[cfg(test)]
fn heading_regex() -> &'static regex::Regex {
    use regex::Regex;
    use std::sync::OnceLock;

    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| {
        Regex::new(r"(?m)^(## System Instructions|## Conversation|### User|### Assistant)\n\n")
            .expect("heading pattern is a valid regex")
    })
}

/// Recover the messages from a document produced by [`render_markdown`].
///
/// Message bodies are taken verbatim between headings; the blank line the
/// writer appends after each body is stripped.
#[cfg(test)]
pub fn parse_markdown(document: &str) -> Vec<ChatMessage> {
    let body = document.strip_suffix(FOOTER).unwrap_or(document);

    let headings: Vec<(usize, usize, &str)> = heading_regex()
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps.get(1)?.as_str()))
        })
        .collect();

    let mut messages = Vec::new();
    for (i, &(_, content_start, heading)) in headings.iter().enumerate() {
        let content_end = headings.get(i + 1).map(|&(start, _, _)| start).unwrap_or(body.len());
        let raw = &body[content_start..content_end];
        let content = raw.strip_suffix("\n\n").unwrap_or(raw);

        let role = match heading {
            "## System Instructions" => ChatRole::System,
            "### User" => ChatRole::User,
            "### Assistant" => ChatRole::Assistant,
            _ => continue,
        };
        messages.push(ChatMessage { role, content: content.to_string() });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("S"),
            ChatMessage::user("U"),
            ChatMessage::assistant("A"),
        ]
    }

    #[test]
    fn test_document_layout() {
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let doc = render_markdown(&sample(), &timestamp);

        assert!(doc.starts_with("# Synthara Chat Session\n\nDate: 2025-03-04 05:06:07\n\n"));
        assert!(doc.contains("## System Instructions\n\nS\n\n## Conversation\n\n### User\n\nU\n\n### Assistant\n\nA\n\n"));
        assert!(doc.ends_with(FOOTER));
    }

    #[test]
    fn test_round_trip_preserves_contents_and_order() {
        let doc = render_markdown(&sample(), &Local::now());
        assert_eq!(parse_markdown(&doc), sample());
    }

    #[test]
    fn test_round_trip_multiline_content() {
        let messages = vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("line one\nline two"),
            ChatMessage::assistant("# Heading\n\n- item\n\n```\ncode\n```"),
        ];
        let doc = render_markdown(&messages, &Local::now());
        assert_eq!(parse_markdown(&doc), messages);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.md");

        write_markdown(&sample(), path.to_str().unwrap()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(parse_markdown(&written), sample());
    }

    #[test]
    fn test_write_rejects_blank_path() {
        assert!(matches!(write_markdown(&sample(), "   "), Err(ExportError::EmptyPath)));
    }
}
