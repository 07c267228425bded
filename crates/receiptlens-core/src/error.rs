//! Error types for ReceiptLens

use thiserror::Error;

/// Message shown when no response came back at all
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Message shown when the session was rejected and no detail was supplied
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid user input, caught before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// 401 from the backend. The gateway has already cleared the session.
    #[error("Unauthorized: {}", .detail.as_deref().unwrap_or("credentials rejected"))]
    Unauthorized { detail: Option<String> },

    /// 4xx/5xx with an optional structured detail message
    #[error("Backend rejected request ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Backend { status: u16, detail: Option<String> },

    /// No response (connect failure, timeout, broken body)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("An upload is already in progress")]
    UploadInProgress,

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl Error {
    /// Human-readable message for display
    ///
    /// Backend details are surfaced verbatim; everything else falls back to
    /// `fallback` (or a connection hint for transport failures).
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Backend {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Error::Unauthorized {
                detail: Some(detail),
            } => detail.clone(),
            Error::Unauthorized { detail: None } => SESSION_EXPIRED_MESSAGE.to_string(),
            Error::Transport(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Error::UploadInProgress => self.to_string(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            Error::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
