use log::warn;

use crate::api::models::Message;
use crate::api::stomp::Frame;

pub const SEND_DESTINATION: &str = "/app/chat.send";
const TOPIC_PREFIX: &str = "/topic/chat/";

pub fn conversation_topic(conversation_id: i64) -> String {
    format!("{TOPIC_PREFIX}{conversation_id}")
}

pub fn topic_conversation_id(destination: &str) -> Option<i64> {
    destination.strip_prefix(TOPIC_PREFIX)?.parse().ok()
}

/// What the realtime channel reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// The full current message sequence of a conversation. Always a snapshot,
    /// never a delta.
    Snapshot {
        conversation_id: i64,
        messages: Vec<Message>,
    },
}

impl ChannelEvent {
    /// Interpret an inbound `MESSAGE` frame. Frames for other destinations or
    /// with bodies that are not a message array are logged and dropped.
    pub fn from_message_frame(frame: &Frame) -> Option<Self> {
        let destination = frame.get("destination")?;
        let Some(conversation_id) = topic_conversation_id(destination) else {
            warn!("ignoring push on unexpected destination {destination}");
            return None;
        };
        match serde_json::from_str::<Vec<Message>>(&frame.body) {
            Ok(messages) => Some(ChannelEvent::Snapshot {
                conversation_id,
                messages,
            }),
            Err(e) => {
                warn!("failed to parse snapshot for conversation {conversation_id}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Sender;

    #[test]
    fn topic_round_trip() {
        assert_eq!(conversation_topic(42), "/topic/chat/42");
        assert_eq!(topic_conversation_id("/topic/chat/42"), Some(42));
        assert_eq!(topic_conversation_id("/topic/other/42"), None);
        assert_eq!(topic_conversation_id("/topic/chat/abc"), None);
    }

    #[test]
    fn message_frame_becomes_snapshot() {
        let frame = Frame::new("MESSAGE")
            .header("destination", "/topic/chat/9")
            .with_body(r#"[{"sender":"user","content":"hi"},{"sender":"assistant","content":"hello"}]"#);
        let Some(ChannelEvent::Snapshot {
            conversation_id,
            messages,
        }) = ChannelEvent::from_message_frame(&frame)
        else {
            panic!("expected snapshot");
        };
        assert_eq!(conversation_id, 9);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::Assistant);
    }

    #[test]
    fn bad_body_is_dropped() {
        let frame = Frame::new("MESSAGE")
            .header("destination", "/topic/chat/9")
            .with_body("{not json");
        assert_eq!(ChannelEvent::from_message_frame(&frame), None);
    }
}
