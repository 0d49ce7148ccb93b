use thiserror::Error;

/// Caller-facing error taxonomy. Subsystem crates convert their own errors
/// into this enum at the service boundary.
#[derive(Debug, Error)]
pub enum CrondeckError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task not found: {name}")]
    NotFound { name: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Scheduler sync error: {0}")]
    SchedulerSync(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Log access error: {0}")]
    LogAccess(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrondeckError {
    pub fn not_found(name: impl Into<String>) -> Self {
        CrondeckError::NotFound { name: name.into() }
    }

    /// Short error code string returned to HTTP and CLI clients.
    pub fn code(&self) -> &'static str {
        match self {
            CrondeckError::Validation(_) => "VALIDATION_ERROR",
            CrondeckError::NotFound { .. } => "NOT_FOUND",
            CrondeckError::Storage(_) => "STORAGE_ERROR",
            CrondeckError::SchedulerSync(_) => "SCHEDULER_SYNC_ERROR",
            CrondeckError::Execution(_) => "EXECUTION_ERROR",
            CrondeckError::LogAccess(_) => "LOG_ACCESS_ERROR",
            CrondeckError::Config(_) => "CONFIG_ERROR",
            CrondeckError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors caused by the request itself rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CrondeckError::Validation(_) | CrondeckError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CrondeckError>;
