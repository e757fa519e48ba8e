use thiserror::Error;

use crate::traceability::event::DateParseError;

impl From<serde_json::Error> for VerifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedContent(format!("JSON error: {}", err))
    }
}

impl From<config::ConfigError> for VerifierError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Workspace error: {0}")]
    WorkspaceError(String),

    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Date parse error: {0}")]
    DateParse(#[from] DateParseError),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VerifierError>;

impl VerifierError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn missing_field(document: &str, field: &str) -> Self {
        Self::MalformedContent(format!("{} has no '{}' field", document, field))
    }

    pub fn invalid_window(start: &str, end: &str) -> Self {
        Self::MalformedContent(format!(
            "Traceability window starts after it ends: {} > {}",
            start, end
        ))
    }
}
