//! CDP error types.

use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to the browser.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Debugging endpoint not reachable.
    #[error("browser not available at {0}")]
    BrowserNotAvailable(String),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("cdp error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error during endpoint discovery.
    #[error("http error: {0}")]
    Http(String),

    /// Navigation failed.
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// Element not found.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// JavaScript execution error.
    #[error("javascript error: {0}")]
    JavaScript(String),

    /// Timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}
