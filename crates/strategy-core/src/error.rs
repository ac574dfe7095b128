use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Invalid strategy: {0}")]
    Validation(String),

    #[error("Strategy '{0}' not found")]
    NotFound(String),

    #[error("Strategy '{0}' already exists")]
    AlreadyExists(String),

    #[error("Not connected to the brokerage gateway")]
    ConnectionRequired,

    #[error("Scan failed for '{strategy}': {message}")]
    Scan { strategy: String, message: String },

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed strategy document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScreenerError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScreenerError::Storage {
            path: path.into(),
            source,
        }
    }

    /// True for failures that should stop a CLI run outright rather than be
    /// reported next to the strategy that hit them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScreenerError::ConnectionRequired | ScreenerError::Storage { .. }
        )
    }
}
