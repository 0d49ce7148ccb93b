//! Read access to per-run log files.

use std::path::PathBuf;

use crondeck_core::layout::{Layout, LOG_EXTENSION};
use serde::Serialize;

use crate::error::{Result, RunnerError};

/// Newest log of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LatestLog {
    Found { path: String, content: String },
    /// The log directory exists but holds no run yet.
    Empty,
}

/// Return the lexicographically greatest `*.log` under `logs/<task_name>/`.
///
/// Log names are timestamps, so the greatest name is the most recent run.
/// Non-UTF-8 bytes in the file are replaced rather than rejected.
pub async fn latest(layout: &Layout, task_name: &str) -> Result<LatestLog> {
    let dir = layout.log_dir(task_name);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RunnerError::LogDirMissing {
                task: task_name.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<PathBuf> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        if newest
            .as_ref()
            .map_or(true, |current| path.file_name() > current.file_name())
        {
            newest = Some(path);
        }
    }

    let Some(path) = newest else {
        return Ok(LatestLog::Empty);
    };
    let bytes = tokio::fs::read(&path).await?;
    Ok(LatestLog::Found {
        path: path.to_string_lossy().into_owned(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
