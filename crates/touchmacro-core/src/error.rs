//! Structured errors, serializable so front-ends can print them as JSON

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The input-synthesis capability is not connected.
    CapabilityUnavailable,
    NotFound,
    InvalidBundle,
    InvalidSettings,
    Storage,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn capability_unavailable() -> Self {
        Self::new(ErrorCode::CapabilityUnavailable, "capability unavailable").with_suggestions(
            vec!["Enable the input-synthesis service and retry".to_string()],
        )
    }

    pub fn macro_not_found(id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("No macro with id: {}", id))
    }

    pub fn invalid_bundle(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidBundle,
            format!("Invalid macro bundle: {}", reason),
        )
    }

    pub fn invalid_settings(field: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidSettings,
            format!("Invalid setting '{}': {}", field, reason),
        )
    }

    pub fn storage(action: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Storage, format!("{} failed: {}", action, reason))
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::new(ErrorCode::NotFound, e.to_string())
        } else {
            Self::new(ErrorCode::Storage, e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::Storage, format!("malformed record: {}", e))
    }
}
