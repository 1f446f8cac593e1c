use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::api::models::Sender;
use crate::store::ChatStore;
use crate::utils::{format_clock, wrap_text};

pub const ASSISTANT_NAME: &str = "Tripper";
pub const NO_MESSAGES: &str = "No messages yet.";
pub const NO_CONVERSATION: &str = "Select a conversation to view messages.";
pub const TYPING: &str = "Tripper is typing...";
pub const PLACEHOLDER: &str = "Ask Tripper about your trip...";

fn centered(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn right_aligned(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.chars().count());
    format!("{}{}", " ".repeat(pad), text)
}

fn flush(lines: &mut Vec<String>, current: &mut String) {
    if !current.trim().is_empty() {
        lines.push(std::mem::take(current));
    }
    current.clear();
}

/// Flatten Markdown into display lines. Markup is dropped, list items get a
/// bullet (or their number), code keeps its text without the ticks.
pub fn markdown_lines(source: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    // next number per open list, `None` for bullet lists
    let mut lists: Vec<Option<u64>> = Vec::new();

    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::List(start)) => {
                flush(&mut lines, &mut current);
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                flush(&mut lines, &mut current);
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                flush(&mut lines, &mut current);
                current.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        current.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => current.push_str("• "),
                }
            }
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            )
            | Event::HardBreak
            | Event::Rule => flush(&mut lines, &mut current),
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak => current.push(' '),
            _ => {}
        }
    }
    flush(&mut lines, &mut current);
    lines
}

fn formatted(content: &str, width: usize) -> Vec<String> {
    markdown_lines(content)
        .iter()
        .flat_map(|line| wrap_text(line, width))
        .collect()
}

/// Message list for the active conversation. User turns hug the right edge,
/// assistant turns the left, both wrapped to three quarters of the width.
pub fn render(store: &ChatStore, width: usize) -> Vec<String> {
    let width = width.max(16);
    let bubble = (width * 3 / 4).max(8);
    let mut lines = Vec::new();

    if store.messages.is_empty() {
        lines.push(String::new());
        let empty = if store.active.is_some() { NO_MESSAGES } else { NO_CONVERSATION };
        lines.push(centered(empty, width));
    }

    for msg in &store.messages {
        let mut footer = msg
            .timestamp
            .as_deref()
            .and_then(format_clock)
            .unwrap_or_default();
        if msg.pending {
            if !footer.is_empty() {
                footer.push(' ');
            }
            footer.push_str("(sending)");
        }

        lines.push(String::new());
        match msg.sender {
            Sender::User => {
                lines.push(right_aligned("You", width));
                for line in formatted(&msg.content, bubble) {
                    lines.push(right_aligned(&line, width));
                }
                if !footer.is_empty() {
                    lines.push(right_aligned(&footer, width));
                }
            }
            Sender::Assistant => {
                lines.push(format!("{ASSISTANT_NAME}:"));
                for line in formatted(&msg.content, bubble) {
                    lines.push(format!("  {line}"));
                }
                if !footer.is_empty() {
                    lines.push(format!("  {footer}"));
                }
            }
        }
    }

    if store.composing {
        lines.push(String::new());
        lines.push(TYPING.to_string());
    }

    if store.active.is_some() {
        lines.push(String::new());
        let status = if store.connected { "" } else { " (offline)" };
        lines.push(format!("» {PLACEHOLDER}{status}"));
    }
    lines
}
