use crondeck_core::error::CrondeckError;
use thiserror::Error;

/// Errors raised while syncing the native scheduler.
#[derive(Debug, Error)]
pub enum CronError {
    /// The scheduler tool could not be started at all.
    #[error("{tool} is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// The scheduler tool ran but exited nonzero.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The schedule string has no equivalent on this platform.
    #[error("Unsupported schedule for this platform: {0}")]
    UnsupportedSchedule(String),

    /// Writing or removing the wrapper script failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CronError> for CrondeckError {
    fn from(e: CronError) -> Self {
        CrondeckError::SchedulerSync(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CronError>;
