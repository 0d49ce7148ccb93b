use serde::{Deserialize, Serialize};

/// User-supplied fields for creating or replacing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub name: String,
    pub schedule: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
    /// Falls back to the application base directory when unset.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// A persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique key. Immutable once created.
    pub name: String,
    /// Cron-style expression, passed through to the native scheduler untouched.
    pub schedule: String,
    /// Shell command line.
    pub command: String,
    pub description: String,
    pub working_dir: Option<String>,
    /// RFC 3339 timestamp of creation.
    pub created_at: String,
    /// RFC 3339 timestamp of the last full replace.
    pub updated_at: String,
}

impl Task {
    /// Build a fresh record from a definition, stamping both timestamps with now.
    pub fn from_definition(def: TaskDefinition) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            name: def.name,
            schedule: def.schedule,
            command: def.command,
            description: def.description,
            working_dir: def.working_dir.filter(|d| !d.trim().is_empty()),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Outcome of a single run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            RunStatus::Success
        } else {
            RunStatus::Failed
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One row of the append-only execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    /// Reference only; the record outlives the task.
    pub task_name: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`, so string order is time order.
    pub run_time: String,
    pub status: RunStatus,
    pub output: String,
    pub log_file: Option<String>,
}

/// What an on-demand run hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_name: String,
    pub success: bool,
    /// `None` when the process never produced an exit status (spawn error, timeout, signal).
    pub return_code: Option<i32>,
    pub output: String,
    pub log_file: String,
    pub run_time: String,
    /// Set when the run happened but its history record could not be stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

/// Dashboard row: a task plus its latest run facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(flatten)]
    pub task: Task,
    pub last_run: Option<String>,
    pub ran_today: bool,
}

/// Format used for `ExecutionRecord::run_time`.
pub const RUN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time rendered with [`RUN_TIME_FORMAT`].
pub fn now_run_time() -> String {
    chrono::Local::now().format(RUN_TIME_FORMAT).to_string()
}
