//! Error types for scenelink-client

use scenelink_protocol::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response channel transport error
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A reply that does not decode as an envelope
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Broker answered with an error status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The viewer ran the operation and reported a failure
    #[error("Viewer error: {0}")]
    Remote(String),

    /// No viewer answered a collect
    #[error("No viewer responded: {0}")]
    NoResponse(String),

    /// The broker did not greet the response channel
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Invalid broker URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(err))
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
