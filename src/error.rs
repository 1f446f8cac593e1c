use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {endpoint}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Stomp(#[from] StompError),
    #[error("broker sent ERROR: {0}")]
    Broker(String),
    #[error("connection closed before CONNECTED")]
    Handshake,
    #[error("channel is not connected")]
    NotConnected,
    #[error("channel task has stopped")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StompError {
    #[error("frame is missing its command line")]
    MissingCommand,
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),
    #[error("frame is not NUL-terminated")]
    Unterminated,
    #[error("content-length {0} exceeds frame size")]
    ContentLength(usize),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("no data directory available")]
    NoDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available")]
    NoConfigDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
