use crondeck_core::error::CrondeckError;
use crondeck_store::StoreError;
use thiserror::Error;

/// Errors raised while executing a task or reading its logs.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The shell could not be started.
    #[error("Spawn failed: {0}")]
    Spawn(String),

    /// The command outlived its time budget and was killed.
    #[error("Command timed out after {secs} s")]
    Timeout { secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `logs/<task>/` does not exist; the task never ran and has no wrapper.
    #[error("No log directory for task: {task}")]
    LogDirMissing { task: String },

    #[error(transparent)]
    History(#[from] StoreError),
}

impl From<RunnerError> for CrondeckError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Spawn(_) | RunnerError::Timeout { .. } => {
                CrondeckError::Execution(e.to_string())
            }
            RunnerError::Io(_) => CrondeckError::LogAccess(e.to_string()),
            RunnerError::LogDirMissing { task } => CrondeckError::not_found(task),
            RunnerError::History(inner) => inner.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
