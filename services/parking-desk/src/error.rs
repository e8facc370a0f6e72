//! Error types for the parking desk

/// Errors that can occur in the parking desk
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend returned status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("Push channel protocol error: {0}")]
    Protocol(String),

    #[error("Push channel connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Plate recognition failed: {0}")]
    Recognition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeskError {
    /// Message reported by the backend, if this is a server-side business error
    pub fn server_message(&self) -> Option<&str> {
        match self {
            DeskError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for parking desk operations
pub type Result<T> = std::result::Result<T, DeskError>;
