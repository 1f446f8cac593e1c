use chrono::Utc;

use crate::api::models::{ChatPayload, Conversation, Message, Sender};

/// Client-local view of the user's conversations. The backend owns the data;
/// this is a transient copy written only from the UI task.
#[derive(Debug, Default)]
pub struct ChatStore {
    pub conversations: Vec<Conversation>,
    pub active: Option<i64>,
    pub messages: Vec<Message>,
    pub composing: bool,
    pub connected: bool,
    pub editing: Option<(i64, String)>,
    pub open_menu: Option<i64>,
    pub pending_delete: Option<i64>,
    pub sidebar_open: bool,
    pub alert: Option<String>,
    pub notice: Option<String>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self, id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// A freshly started conversation becomes active with its history.
    pub fn start_conversation(&mut self, id: i64, history: Vec<Message>) {
        if self.active != Some(id) {
            self.composing = false;
        }
        self.active = Some(id);
        self.messages = history;
    }

    pub fn load_conversation(&mut self, id: i64, messages: Vec<Message>) {
        if self.active != Some(id) {
            self.composing = false;
        }
        self.active = Some(id);
        self.messages = messages;
    }

    /// Replace the whole sequence with a server snapshot. Snapshots for a
    /// conversation other than the active one are ignored. Returns whether the
    /// snapshot was applied.
    pub fn apply_snapshot(&mut self, conversation_id: i64, messages: Vec<Message>) -> bool {
        if self.active != Some(conversation_id) {
            return false;
        }
        self.messages = messages;
        self.composing = false;
        true
    }

    /// Validate an outgoing message and append it optimistically. Returns the
    /// payload to publish, or `None` when nothing should be sent.
    pub fn prepare_send(&mut self, input: &str, user_id: &str) -> Option<ChatPayload> {
        if input.trim().is_empty() || !self.connected {
            return None;
        }
        let conversation_id = self.active?;

        self.messages.push(Message {
            sender: Sender::User,
            content: input.to_string(),
            timestamp: Some(Utc::now().to_rfc3339()),
            pending: true,
        });
        self.composing = true;

        Some(ChatPayload {
            user_id: user_id.to_string(),
            content: input.to_string(),
            conversation_id,
        })
    }

    /// Undo the optimistic append of a message that could not be published.
    pub fn retract_send(&mut self) {
        if self.messages.last().is_some_and(|m| m.pending) {
            self.messages.pop();
        }
        self.composing = false;
    }

    /// Enter edit mode for a conversation title, pre-filled with the current one.
    pub fn begin_rename(&mut self, id: i64) {
        let draft = self
            .conversation(id)
            .and_then(|c| c.title.clone())
            .unwrap_or_default();
        self.editing = Some((id, draft));
        self.open_menu = None;
    }

    pub fn set_draft(&mut self, draft: &str) {
        if let Some((_, current)) = self.editing.as_mut() {
            *current = draft.to_string();
        }
    }

    /// Leave edit mode. Yields the rename to submit, unless the title is blank.
    pub fn take_rename(&mut self) -> Option<(i64, String)> {
        let (id, draft) = self.editing.take()?;
        let title = draft.trim();
        if title.is_empty() {
            None
        } else {
            Some((id, title.to_string()))
        }
    }

    pub fn request_delete(&mut self, id: i64) {
        self.pending_delete = Some(id);
        self.open_menu = None;
    }

    /// Answer the pending confirmation. Returns the id to delete if confirmed.
    pub fn confirm_delete(&mut self, confirmed: bool) -> Option<i64> {
        let id = self.pending_delete.take()?;
        confirmed.then_some(id)
    }

    /// Forget the active conversation if it was the one removed.
    pub fn remove_conversation(&mut self, id: i64) {
        if self.active == Some(id) {
            self.active = None;
            self.messages.clear();
            self.composing = false;
        }
    }

    pub fn toggle_menu(&mut self, id: i64) {
        self.open_menu = if self.open_menu == Some(id) { None } else { Some(id) };
    }

    pub fn close_menu(&mut self) {
        self.open_menu = None;
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    pub fn set_alert(&mut self, text: impl Into<String>) {
        self.alert = Some(text.into());
    }

    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(text.into());
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: i64, title: Option<&str>) -> Conversation {
        Conversation {
            id,
            title: title.map(str::to_string),
            started_at: "2025-06-01T09:30:00".into(),
        }
    }

    fn live_store(active: i64) -> ChatStore {
        let mut store = ChatStore::new();
        store.set_connected(true);
        store.start_conversation(active, vec![Message::assistant("Welcome!", None)]);
        store
    }

    #[test]
    fn snapshot_replaces_instead_of_merging() {
        let mut store = live_store(42);
        store.prepare_send("Hello", "u").unwrap();
        assert_eq!(store.messages.len(), 2);

        let snapshot = vec![
            Message::user("Hello", None),
            Message::assistant("Hi there", None),
            Message::assistant("Where to?", None),
        ];
        assert!(store.apply_snapshot(42, snapshot.clone()));
        assert_eq!(store.messages, snapshot);
        assert!(!store.composing);
        assert!(store.messages.iter().all(|m| !m.pending));
    }

    #[test]
    fn snapshot_for_other_conversation_is_ignored() {
        let mut store = live_store(42);
        store.composing = true;
        assert!(!store.apply_snapshot(7, vec![]));
        assert_eq!(store.messages.len(), 1);
        assert!(store.composing);
    }

    #[test]
    fn blank_input_never_produces_a_payload() {
        let mut store = live_store(42);
        assert_eq!(store.prepare_send("", "u"), None);
        assert_eq!(store.prepare_send("   \t\n", "u"), None);
        assert_eq!(store.messages.len(), 1);
        assert!(!store.composing);
    }

    #[test]
    fn send_requires_active_conversation_and_connection() {
        let mut store = ChatStore::new();
        store.set_connected(true);
        assert_eq!(store.prepare_send("Hello", "u"), None);

        let mut store = live_store(42);
        store.set_connected(false);
        assert_eq!(store.prepare_send("Hello", "u"), None);
        assert_eq!(store.messages.len(), 1);
    }

    #[test]
    fn send_appends_optimistically_and_sets_composing() {
        let mut store = live_store(42);
        let payload = store.prepare_send("Hello", "user-1").unwrap();
        assert_eq!(payload.conversation_id, 42);
        assert_eq!(payload.content, "Hello");
        assert_eq!(payload.user_id, "user-1");

        let last = store.messages.last().unwrap();
        assert_eq!(last.sender, Sender::User);
        assert_eq!(last.content, "Hello");
        assert!(last.pending);
        assert!(last.timestamp.is_some());
        assert!(store.composing);
    }

    #[test]
    fn rename_with_blank_title_exits_edit_mode_without_submitting() {
        let mut store = ChatStore::new();
        store.set_conversations(vec![conv(1, Some("Lisbon"))]);
        store.begin_rename(1);
        assert_eq!(store.editing, Some((1, "Lisbon".into())));
        store.set_draft("   ");
        assert_eq!(store.take_rename(), None);
        assert_eq!(store.editing, None);
    }

    #[test]
    fn rename_yields_trimmed_title() {
        let mut store = ChatStore::new();
        store.set_conversations(vec![conv(1, None)]);
        store.toggle_menu(1);
        store.begin_rename(1);
        assert_eq!(store.open_menu, None);
        assert_eq!(store.editing, Some((1, String::new())));
        store.set_draft("  Porto weekend ");
        assert_eq!(store.take_rename(), Some((1, "Porto weekend".into())));
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut store = ChatStore::new();
        store.request_delete(3);
        assert_eq!(store.confirm_delete(false), None);
        assert_eq!(store.pending_delete, None);

        store.request_delete(3);
        assert_eq!(store.confirm_delete(true), Some(3));
        assert_eq!(store.confirm_delete(true), None);
    }

    #[test]
    fn removing_active_conversation_clears_messages() {
        let mut store = live_store(42);
        store.remove_conversation(7);
        assert_eq!(store.active, Some(42));

        store.remove_conversation(42);
        assert_eq!(store.active, None);
        assert!(store.messages.is_empty());
    }

    #[test]
    fn menu_toggles_and_closes() {
        let mut store = ChatStore::new();
        store.toggle_menu(1);
        assert_eq!(store.open_menu, Some(1));
        store.toggle_menu(2);
        assert_eq!(store.open_menu, Some(2));
        store.toggle_menu(2);
        assert_eq!(store.open_menu, None);
        store.toggle_menu(1);
        store.close_menu();
        assert_eq!(store.open_menu, None);
    }

    #[test]
    fn switching_conversation_drops_composing() {
        let mut store = live_store(42);
        store.prepare_send("Hello", "u").unwrap();
        store.load_conversation(7, vec![]);
        assert_eq!(store.active, Some(7));
        assert!(store.messages.is_empty());
        assert!(!store.composing);
    }

    #[test]
    fn starting_another_conversation_drops_composing() {
        let mut store = live_store(42);
        store.prepare_send("Hello", "u").unwrap();
        store.start_conversation(42, vec![]);
        assert!(store.composing);

        store.start_conversation(43, vec![]);
        assert_eq!(store.active, Some(43));
        assert!(!store.composing);
    }

    #[test]
    fn retracted_send_removes_pending_message() {
        let mut store = live_store(42);
        store.prepare_send("Hello", "u").unwrap();
        store.retract_send();
        assert_eq!(store.messages.len(), 1);
        assert!(!store.composing);

        // a confirmed message is never removed
        store.retract_send();
        assert_eq!(store.messages.len(), 1);
    }

    #[test]
    fn alert_is_taken_once() {
        let mut store = ChatStore::new();
        store.set_alert("Failed to generate PDF.");
        assert_eq!(store.take_alert().as_deref(), Some("Failed to generate PDF."));
        assert_eq!(store.take_alert(), None);
    }
}
