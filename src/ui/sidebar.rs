use crate::store::ChatStore;
use crate::utils::format_started_at;

pub const TITLE: &str = "Your Conversations";

pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

/// Conversation list with the inline rename field and per-row action menu.
pub fn render(store: &ChatStore, width: usize) -> Vec<String> {
    let mut lines = vec![truncate(TITLE, width), truncate(&"─".repeat(TITLE.len()), width)];

    if store.conversations.is_empty() {
        lines.push(truncate("  No conversations yet.", width));
        return lines;
    }

    for conv in &store.conversations {
        let marker = if store.active == Some(conv.id) { '>' } else { ' ' };
        let id_tag = format!(" #{}", conv.id);

        let label = match &store.editing {
            Some((id, draft)) if *id == conv.id => format!("[{draft}_]"),
            _ => conv
                .display_title()
                .map(str::to_string)
                .unwrap_or_else(|| format_started_at(&conv.started_at)),
        };

        let room = width.saturating_sub(2 + id_tag.chars().count());
        lines.push(format!("{marker} {}{id_tag}", truncate(&label, room)));

        if store.open_menu == Some(conv.id) {
            for (action, command) in [("Rename", "rename"), ("Export", "export"), ("Delete", "delete")] {
                lines.push(truncate(
                    &format!("    {action:<7}/{command} {}", conv.id),
                    width,
                ));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Conversation;

    fn store() -> ChatStore {
        let mut store = ChatStore::new();
        store.set_conversations(vec![
            Conversation {
                id: 1,
                title: Some("Paris Trip".into()),
                started_at: "2025-06-01T09:30:00".into(),
            },
            Conversation {
                id: 2,
                title: None,
                started_at: "2025-06-02T18:45:00".into(),
            },
        ]);
        store
    }

    #[test]
    fn lists_titles_or_start_time_and_marks_active() {
        let mut store = store();
        store.active = Some(2);
        let lines = render(&store, 40);
        assert_eq!(lines[0], TITLE);
        assert_eq!(lines[2], "  Paris Trip #1");
        assert_eq!(lines[3], "> 2025-06-02 18:45 #2");
    }

    #[test]
    fn shows_menu_under_its_row() {
        let mut store = store();
        store.toggle_menu(1);
        let lines = render(&store, 40);
        assert_eq!(lines[3], "    Rename /rename 1");
        assert_eq!(lines[4], "    Export /export 1");
        assert_eq!(lines[5], "    Delete /delete 1");
        assert_eq!(lines[6], "  2025-06-02 18:45 #2");
    }

    #[test]
    fn shows_edit_field_in_place_of_title() {
        let mut store = store();
        store.begin_rename(1);
        store.set_draft("Paris in spring");
        assert_eq!(render(&store, 40)[2], "  [Paris in spring_] #1");
    }

    #[test]
    fn long_titles_are_truncated() {
        let mut store = store();
        store.conversations[0].title = Some("A very long conversation title indeed".into());
        let row = &render(&store, 20)[2];
        assert_eq!(row.chars().count(), 20);
        assert!(row.ends_with("… #1"));
    }

    #[test]
    fn empty_list() {
        let lines = render(&ChatStore::new(), 40);
        assert_eq!(lines.last().unwrap(), "  No conversations yet.");
    }

    #[test]
    fn truncate_edges() {
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("abcd", 3), "ab…");
        assert_eq!(truncate("abcd", 0), "");
    }
}
