use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// Rejected locally, the backend was never called.
    #[error("{0}")]
    Validation(String),

    #[error("backend request failed with status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("realtime channel error: {0}")]
    Realtime(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PortalError::Validation(_))
    }

    /// The backend refused the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PortalError::Backend { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
