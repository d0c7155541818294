//! Error types surfaced by the engine API.
//!
//! Authoring defects and vanished entities are logged, not returned. What
//! remains here are failures a caller can act on: unreadable configuration,
//! malformed communications tables and misuse of a torn-down controller.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine configuration")]
    Config(#[from] toml::de::Error),

    #[error("invalid communications table")]
    Comms(#[from] ron::error::SpannedError),

    #[error("communications priority {0} is outside 1..=4")]
    InvalidCommsPriority(u8),

    #[error("no rule registered under {0:?}")]
    UnknownRule(String),

    #[error("controller was torn down")]
    TornDown,
}

impl AiError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AiError::Io {
            path: path.into(),
            source,
        }
    }
}
