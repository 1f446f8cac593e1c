//! Minimal STOMP 1.2 framing, enough to talk to a Spring simple broker over a
//! raw WebSocket: CONNECT/CONNECTED, SUBSCRIBE/UNSUBSCRIBE, SEND, MESSAGE,
//! ERROR and DISCONNECT, plus heart-beat negotiation.

use std::time::Duration;

use crate::error::StompError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Frame::new("CONNECT")
            .header("accept-version", "1.2,1.1,1.0")
            .header("host", host)
            .header("heart-beat", heart_beat.to_string())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new("SUBSCRIBE")
            .header("id", id)
            .header("destination", destination)
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new("UNSUBSCRIBE").header("id", id)
    }

    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Frame::new("SEND")
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .with_body(body)
    }

    pub fn disconnect() -> Self {
        Frame::new("DISCONNECT")
    }

    /// First value for `name`; repeated headers after the first are ignored.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn escapes_headers(command: &str) -> bool {
        !matches!(command, "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> String {
        let escape = Self::escapes_headers(&self.command);
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

/// Parse every frame in one WebSocket text message. Bare EOLs between frames
/// are heart-beats and are skipped.
pub fn parse_frames(text: &str) -> Result<Vec<Frame>, StompError> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(['\n', '\r']);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, remaining) = parse_one(rest)?;
        frames.push(frame);
        rest = remaining;
    }
}

fn parse_one(input: &str) -> Result<(Frame, &str), StompError> {
    let head_end = input.find("\n\n").map(|i| (i, 2));
    let crlf_end = input.find("\r\n\r\n").map(|i| (i, 4));
    let (split, sep_len) = match (head_end, crlf_end) {
        (Some(a), Some(b)) => if a.0 < b.0 { a } else { b },
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return Err(StompError::Unterminated),
    };

    let head = &input[..split];
    let after_head = &input[split + sep_len..];

    let mut lines = head.lines();
    let command = lines
        .next()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .ok_or(StompError::MissingCommand)?
        .to_string();
    let escaped = Frame::escapes_headers(&command);

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
        if escaped {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());

    let (body, remaining) = match content_length {
        Some(len) => {
            if after_head.len() < len + 1 || !after_head.is_char_boundary(len) {
                return Err(StompError::ContentLength(len));
            }
            if after_head.as_bytes()[len] != 0 {
                return Err(StompError::Unterminated);
            }
            (&after_head[..len], &after_head[len + 1..])
        }
        None => {
            let nul = after_head.find('\0').ok_or(StompError::Unterminated)?;
            (&after_head[..nul], &after_head[nul + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

/// `heart-beat` header value: (can send every `send` ms, wants one every `receive` ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub send: u64,
    pub receive: u64,
}

impl HeartBeat {
    pub fn new(send: u64, receive: u64) -> Self {
        Self { send, receive }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (send, receive) = value.split_once(',')?;
        Some(Self {
            send: send.trim().parse().ok()?,
            receive: receive.trim().parse().ok()?,
        })
    }

    /// Interval at which the client must send heart-beats, if any.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> Option<Duration> {
        if client.send == 0 || server.receive == 0 {
            return None;
        }
        Some(Duration::from_millis(client.send.max(server.receive)))
    }
}

impl std::fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.send, self.receive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_frame_carries_length_and_json_type() {
        let encoded = Frame::send("/app/chat.send", r#"{"a":1}"#).encode();
        assert_eq!(
            encoded,
            "SEND\ndestination:/app/chat.send\ncontent-type:application/json\ncontent-length:7\n\n{\"a\":1}\0"
        );
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let encoded = Frame::connect("localhost:8080", HeartBeat::new(10000, 10000)).encode();
        assert!(encoded.contains("host:localhost:8080\n"));
        assert!(encoded.contains("heart-beat:10000,10000\n"));
        assert!(encoded.ends_with("\n\n\0"));
    }

    #[test]
    fn header_values_are_escaped_and_unescaped() {
        let frame = Frame::new("MESSAGE").header("note", "a:b\nc\\d");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\nc\\\\d\n"));
        let parsed = parse_frames(&encoded).unwrap();
        assert_eq!(parsed, vec![frame]);
    }

    #[test]
    fn parses_message_with_content_length_containing_nul() {
        let text = "MESSAGE\ndestination:/topic/chat/42\ncontent-length:3\n\na\0b\0";
        let frames = parse_frames(text).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body, "a\0b");
        assert_eq!(frames[0].get("destination"), Some("/topic/chat/42"));
    }

    #[test]
    fn skips_heartbeats_and_reads_multiple_frames() {
        let text = "\n\nCONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0\nMESSAGE\ndestination:/x\n\n[]\0\n";
        let frames = parse_frames(text).unwrap();
        let commands: Vec<_> = frames.iter().map(|f| f.command.as_str()).collect();
        assert_eq!(commands, vec!["CONNECTED", "MESSAGE"]);
        assert_eq!(frames[1].body, "[]");
    }

    #[test]
    fn heartbeat_only_message_yields_no_frames() {
        assert!(parse_frames("\n").unwrap().is_empty());
    }

    #[test]
    fn accepts_crlf_line_endings() {
        let frames = parse_frames("RECEIPT\r\nreceipt-id:1\r\n\r\n\0").unwrap();
        assert_eq!(frames[0].command, "RECEIPT");
        assert_eq!(frames[0].get("receipt-id"), Some("1"));
    }

    #[test]
    fn first_repeated_header_wins() {
        let frames = parse_frames("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap();
        assert_eq!(frames[0].get("foo"), Some("1"));
    }

    #[test]
    fn rejects_unterminated_and_malformed_frames() {
        assert_eq!(
            parse_frames("MESSAGE\ndestination:/x\n\nbody"),
            Err(StompError::Unterminated)
        );
        assert_eq!(
            parse_frames("MESSAGE\nnocolon\n\n\0"),
            Err(StompError::MalformedHeader("nocolon".into()))
        );
        assert_eq!(
            parse_frames("MESSAGE\nx:\\t\n\n\0"),
            Err(StompError::InvalidEscape("\\t".into()))
        );
        assert_eq!(
            parse_frames("MESSAGE\ncontent-length:10\n\nab\0"),
            Err(StompError::ContentLength(10))
        );
    }

    #[test]
    fn heartbeat_negotiation() {
        let client = HeartBeat::new(10000, 10000);
        assert_eq!(
            HeartBeat::negotiate(client, HeartBeat::new(0, 20000)),
            Some(Duration::from_millis(20000))
        );
        assert_eq!(HeartBeat::negotiate(client, HeartBeat::new(5000, 0)), None);
        assert_eq!(HeartBeat::negotiate(HeartBeat::new(0, 0), HeartBeat::new(1, 1)), None);
        assert_eq!(HeartBeat::parse(" 10000 , 0"), Some(HeartBeat::new(10000, 0)));
        assert_eq!(HeartBeat::parse("bogus"), None);
    }
}
