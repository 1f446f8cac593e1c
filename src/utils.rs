use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use url::Url;

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Raw WebSocket transport of the backend's SockJS endpoint.
pub fn websocket_url(api_url: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(api_url)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    // http(s) -> ws(s) are both "special" schemes, so this cannot fail
    let _ = url.set_scheme(scheme);
    let path = format!("{}/ws-chat/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// File name for an exported conversation: the title lowercased, with runs of
/// non-alphanumerics collapsed to `-` and trimmed; `conversation-{id}` if the
/// title is missing or empty.
pub fn export_file_name(title: Option<&str>, id: i64) -> String {
    let source = match title {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("conversation-{id}"),
    };

    let mut slug = String::with_capacity(source.len());
    let mut in_gap = false;
    for ch in source.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }
    format!("{}.pdf", slug.trim_matches('-'))
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if line_len > 0 {
                    out.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(width);
                out.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > width {
                out.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }
        out.push(line);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
}

/// `HH:MM` in local time, for message bubbles.
pub fn format_clock(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.format("%H:%M").to_string())
}

/// Date and time label for an untitled conversation.
pub fn format_started_at(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Hand a file to the desktop's default viewer.
pub fn open_path(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut cmd = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = std::process::Command::new("xdg-open");

    cmd.arg(path).spawn().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_name_from_title() {
        assert_eq!(export_file_name(Some("Paris Trip!!"), 1), "paris-trip.pdf");
        assert_eq!(export_file_name(Some("  São Paulo -- 2025 "), 1), "s-o-paulo-2025.pdf");
        assert_eq!(export_file_name(Some("ROME"), 1), "rome.pdf");
    }

    #[test]
    fn export_name_falls_back_to_id() {
        assert_eq!(export_file_name(Some(""), 7), "conversation-7.pdf");
        assert_eq!(export_file_name(None, 7), "conversation-7.pdf");
    }

    #[test]
    fn normalize_adds_scheme_and_drops_trailing_slash() {
        assert_eq!(normalize_url("example.com/"), "https://example.com");
        assert_eq!(normalize_url(" http://localhost:8080 "), "http://localhost:8080");
    }

    #[test]
    fn websocket_url_maps_scheme_and_path() {
        assert_eq!(
            websocket_url("http://localhost:8080").unwrap().as_str(),
            "ws://localhost:8080/ws-chat/websocket"
        );
        assert_eq!(
            websocket_url("https://api.example.com/tripper/").unwrap().as_str(),
            "wss://api.example.com/tripper/ws-chat/websocket"
        );
    }

    #[test]
    fn wrap_respects_width_and_paragraphs() {
        assert_eq!(
            wrap_text("pack a light jacket and boots", 12),
            vec!["pack a light", "jacket and", "boots"]
        );
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("", 4), vec![""]);
    }

    #[test]
    fn clock_and_start_labels() {
        assert_eq!(format_clock("2025-06-01T09:05:00").as_deref(), Some("09:05"));
        assert_eq!(format_started_at("2025-06-01T09:05:00.123"), "2025-06-01 09:05");
        assert_eq!(format_clock("yesterday"), None);
        assert_eq!(format_started_at("yesterday"), "yesterday");
    }
}
