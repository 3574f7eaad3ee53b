//! State Store Error Types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for state store operations
pub type StateResult<T> = Result<T, StateError>;

/// State store errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("relation state in {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

impl StateError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
