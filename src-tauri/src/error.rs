// Single error enum for storage, the assistant stream and the session layer.
// Tauri commands keep `Result<T, String>` and convert with `?` / `.into()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Filesystem failure in the store or upload directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stream failed to open or dropped.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Rejected user input (empty title, unsupported URL, ...).
    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Not connected to the assistant service")]
    Disconnected,

    /// A document request is already waiting for its response.
    #[error("A document request is already in flight")]
    RequestInFlight,

    /// A chat reply is still outstanding.
    #[error("Still waiting for the previous reply")]
    Busy,

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for String {
    fn from(e: AppError) -> Self {
        e.to_string()
    }
}
