use crondeck_core::error::CrondeckError;
use thiserror::Error;

/// Errors raised by the task and history stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored column could not be decoded into its domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for CrondeckError {
    fn from(e: StoreError) -> Self {
        CrondeckError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
