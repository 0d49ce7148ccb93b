//! Derived filesystem layout.
//!
//! Only task names are stored. Every path below is recomputed from the base
//! directory on demand:
//!
//! ```text
//! <base>/logs/<task>/<timestamp>.log
//! <base>/scripts/<task>.sh      (.cmd on Windows)
//! ```

use std::path::{Path, PathBuf};

use crate::types::Task;

/// Timestamp pattern used in per-run log file names. Lexicographic order of
/// the rendered names equals chronological order.
pub const LOG_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const LOG_EXTENSION: &str = "log";

#[derive(Debug, Clone)]
pub struct Layout {
    base_dir: PathBuf,
}

impl Layout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn logs_root(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn scripts_root(&self) -> PathBuf {
        self.base_dir.join("scripts")
    }

    /// `<base>/logs/<task>`
    pub fn log_dir(&self, task_name: &str) -> PathBuf {
        self.logs_root().join(task_name)
    }

    /// `<base>/scripts/<task>.<ext>`
    pub fn script_path(&self, task_name: &str, extension: &str) -> PathBuf {
        self.scripts_root()
            .join(format!("{task_name}.{extension}"))
    }

    /// The task's configured directory, else the base directory.
    pub fn working_dir(&self, task: &Task) -> PathBuf {
        match task.working_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => self.base_dir.clone(),
        }
    }
}
