use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the extraction engine
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the extraction engine
///
/// Only structural backends and the surrounding plumbing produce these. The
/// regex scanners degrade to empty fact lists instead of failing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    #[error("grammar error: {0}")]
    Grammar(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a parse error for `file`.
    pub fn parse(file: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML serialization error: {}", err))
    }
}

impl From<tree_sitter::LanguageError> for Error {
    fn from(err: tree_sitter::LanguageError) -> Self {
        Error::Grammar(err.to_string())
    }
}
