use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub started_at: String,
}

impl Conversation {
    /// Title if one was set, trimmed; `None` for missing or blank titles.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Appended locally and not yet replaced by a server snapshot.
    #[serde(skip)]
    pub pending: bool,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            timestamp,
            pending: false,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
            timestamp,
            pending: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub conversation_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RenameRequest<'a> {
    pub title: &'a str,
}

/// Body published to `/app/chat.send`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub user_id: String,
    pub content: String,
    pub conversation_id: i64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanRequest {
    pub trip_details: String,
    pub user_name: String,
    pub generate_pdf: bool,
}

/// Recommendation returned by `/trip-plan`. Only the PDF name is interpreted;
/// the rest is shown as the backend sent it.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanResponse {
    #[serde(default)]
    pub pdf_file_name: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversation_uses_camel_case_and_tolerates_null_title() {
        let conv: Conversation = serde_json::from_value(json!({
            "id": 3,
            "title": null,
            "startedAt": "2025-06-01T09:30:00"
        }))
        .unwrap();
        assert_eq!(conv.id, 3);
        assert_eq!(conv.title, None);
        assert_eq!(conv.started_at, "2025-06-01T09:30:00");
        assert_eq!(conv.display_title(), None);
    }

    #[test]
    fn blank_title_has_no_display_title() {
        let conv = Conversation {
            id: 1,
            title: Some("   ".into()),
            started_at: String::new(),
        };
        assert_eq!(conv.display_title(), None);
    }

    #[test]
    fn message_sender_is_lowercase_and_pending_is_local() {
        let mut msg = Message::user("hi", None);
        msg.pending = true;
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"sender": "user", "content": "hi"}));

        let parsed: Message =
            serde_json::from_value(json!({"sender": "assistant", "content": "yo"})).unwrap();
        assert_eq!(parsed.sender, Sender::Assistant);
        assert!(!parsed.pending);
    }

    #[test]
    fn chat_payload_matches_wire_names() {
        let payload = ChatPayload {
            user_id: "u-1".into(),
            content: "Hello".into(),
            conversation_id: 42,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"userId": "u-1", "content": "Hello", "conversationId": 42})
        );
    }

    #[test]
    fn trip_plan_response_keeps_unknown_fields() {
        let resp: TripPlanResponse = serde_json::from_value(json!({
            "pdfFileName": "plan.pdf",
            "recommendation": "Pack a raincoat"
        }))
        .unwrap();
        assert_eq!(resp.pdf_file_name.as_deref(), Some("plan.pdf"));
        assert_eq!(resp.details["recommendation"], "Pack a raincoat");
    }
}
