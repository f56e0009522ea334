use thiserror::Error;

/// Main error type for bitstamp-stream
#[derive(Error, Debug)]
pub enum StreamError {
    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Malformed inbound wire text
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Channel send error
    #[error("channel send error: {0}")]
    ChannelSend(String),

    /// Connection closed unexpectedly
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}

/// Result type for bitstamp-stream operations
pub type Result<T> = std::result::Result<T, StreamError>;
