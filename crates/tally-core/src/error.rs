//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider fetch failed: {0}")]
    Provider(String),

    #[error("Refresh not allowed: {0}")]
    Throttled(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// True for caller input errors that should never be retried
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidRange(_) | Self::UnknownProvider(_))
    }

    /// True when the refresh coordinator refused the operation
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
