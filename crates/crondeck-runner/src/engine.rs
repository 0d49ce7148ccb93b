//! On-demand execution of a single task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crondeck_core::{
    config::ExecutionConfig,
    layout::{Layout, LOG_EXTENSION, LOG_STAMP_FORMAT},
    types::{ExecutionResult, RunStatus, Task, RUN_TIME_FORMAT},
};
use crondeck_store::HistoryStore;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    error::RunnerError,
    exec::{run_command, ExecOutput},
};

/// Runs tasks now, outside the native scheduler.
///
/// Every attempt, including ones that never got to spawn, leaves a log file
/// (when the log directory is writable) and exactly one history record.
pub struct ExecutionEngine {
    layout: Layout,
    history: Arc<HistoryStore>,
    config: ExecutionConfig,
    /// One lock per task name; same-name runs queue, different names overlap.
    running: DashMap<String, Arc<Mutex<()>>>,
}

impl ExecutionEngine {
    pub fn new(layout: Layout, history: Arc<HistoryStore>, config: ExecutionConfig) -> Self {
        Self {
            layout,
            history,
            config,
            running: DashMap::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Execute `task` once and record the outcome.
    ///
    /// Infallible from the caller's side: spawn errors, timeouts and I/O
    /// failures are folded into a failed [`ExecutionResult`]. A history write
    /// failure does not change the run outcome and is reported in
    /// `history_error`.
    pub async fn run(&self, task: &Task) -> ExecutionResult {
        let lock = Arc::clone(
            self.running
                .entry(task.name.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        let now = Local::now();
        let run_time = now.format(RUN_TIME_FORMAT).to_string();
        let log_dir = self.layout.log_dir(&task.name);
        let working_dir = self.layout.working_dir(task);

        let outcome = self.execute(task, &working_dir, &log_dir).await;
        let (success, return_code, output) = match &outcome {
            Ok(out) => (out.success(), out.return_code, describe(out)),
            Err(e) => (false, None, format!("Error: {e}")),
        };

        let log_path = fresh_log_path(&log_dir, &now.format(LOG_STAMP_FORMAT).to_string());
        let log_entry = format!("[{run_time}] Command: {}\n{output}\n", task.command);
        let log_written = match tokio::fs::write(&log_path, log_entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(task = %task.name, path = %log_path.display(), "could not write run log: {e}");
                false
            }
        };
        let log_file = log_path.to_string_lossy().into_owned();

        let status = RunStatus::from_success(success);
        let history_error = self
            .history
            .append_at(
                &task.name,
                &run_time,
                status,
                &output,
                log_written.then_some(log_file.as_str()),
            )
            .err()
            .map(|e| {
                error!(task = %task.name, "failed to record execution history: {e}");
                e.to_string()
            });

        info!(task = %task.name, %status, ?return_code, "task run finished");
        ExecutionResult {
            task_name: task.name.clone(),
            success,
            return_code,
            output,
            log_file,
            run_time,
            history_error,
        }
    }

    async fn execute(
        &self,
        task: &Task,
        working_dir: &Path,
        log_dir: &Path,
    ) -> Result<ExecOutput, RunnerError> {
        tokio::fs::create_dir_all(log_dir).await?;
        tokio::fs::create_dir_all(working_dir).await?;
        run_command(
            &task.command,
            working_dir,
            Duration::from_secs(self.config.effective_timeout_secs()),
            self.config.max_output_chars,
        )
        .await
    }
}

/// History/log body for a completed process.
fn describe(out: &ExecOutput) -> String {
    let code = out
        .return_code
        .map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string());
    format!(
        "Return code: {code}\nSTDOUT:\n{}\nSTDERR:\n{}",
        out.stdout, out.stderr
    )
}

/// `<dir>/<stamp>.log`, or `<dir>/<stamp>_NN.log` if that name is taken.
///
/// The suffixed names sort after the bare one and before the next second.
fn fresh_log_path(log_dir: &Path, stamp: &str) -> PathBuf {
    let bare = log_dir.join(format!("{stamp}.{LOG_EXTENSION}"));
    if !bare.exists() {
        return bare;
    }
    (1u32..)
        .map(|n| log_dir.join(format!("{stamp}_{n:02}.{LOG_EXTENSION}")))
        .find(|p| !p.exists())
        .unwrap_or(bare)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logs::{latest, LatestLog};
    use crondeck_core::types::TaskDefinition;
    use rusqlite::Connection;

    fn engine(base: &Path, timeout_secs: u64) -> ExecutionEngine {
        let history = HistoryStore::new(Connection::open_in_memory().unwrap(), 30).unwrap();
        ExecutionEngine::new(
            Layout::new(base),
            Arc::new(history),
            ExecutionConfig {
                timeout_secs,
                ..ExecutionConfig::default()
            },
        )
    }

    fn task(name: &str, command: &str) -> Task {
        Task::from_definition(TaskDefinition {
            name: name.to_string(),
            schedule: "0 2 * * *".to_string(),
            command: command.to_string(),
            description: String::new(),
            working_dir: None,
        })
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 10);

        let result = engine.run(&task("ok", "echo hello; echo warn >&2")).await;
        assert!(result.success);
        assert_eq!(result.return_code, Some(0));
        assert!(result.output.contains("STDOUT:\nhello"));
        assert!(result.output.contains("STDERR:\nwarn"));

        let log = std::fs::read_to_string(&result.log_file).unwrap();
        assert!(log.contains("Command: echo hello; echo warn >&2"));
        assert!(log.contains("Return code: 0"));

        let records = engine.history().recent("ok", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Success);
        assert_eq!(records[0].run_time, result.run_time);
        assert_eq!(records[0].log_file.as_deref(), Some(result.log_file.as_str()));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 10);

        let result = engine.run(&task("bad", "exit 7")).await;
        assert!(!result.success);
        assert_eq!(result.return_code, Some(7));
        assert_eq!(
            engine.history().recent("bad", 1).unwrap()[0].status,
            RunStatus::Failed
        );
    }

    #[tokio::test]
    async fn timeout_is_failure_with_reason() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 1);

        let result = engine.run(&task("slow", "sleep 10")).await;
        assert!(!result.success);
        assert_eq!(result.return_code, None);
        assert!(result.output.contains("timed out after 1 s"), "{}", result.output);

        let record = &engine.history().recent("slow", 1).unwrap()[0];
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.output.contains("timed out"));
    }

    #[tokio::test]
    async fn timeout_reaps_background_children() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 1);
        let marker = base.path().join("late-marker");
        let command = format!("(sleep 3; touch '{}') & wait", marker.display());

        let result = engine.run(&task("forker", &command)).await;
        assert!(!result.success);
        assert!(result.output.contains("timed out"), "{}", result.output);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!marker.exists(), "forked child outlived the timeout");
    }

    #[tokio::test]
    async fn history_failure_is_reported_on_the_result() {
        let base = tempfile::tempdir().unwrap();
        let db_path = base.path().join("history.db");
        let history = HistoryStore::new(Connection::open(&db_path).unwrap(), 30).unwrap();
        Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE history;")
            .unwrap();
        let engine = ExecutionEngine::new(
            Layout::new(base.path()),
            Arc::new(history),
            ExecutionConfig::default(),
        );

        let result = engine.run(&task("unrecorded", "echo ran")).await;
        assert!(result.success);
        assert!(result.output.contains("ran"));
        let reason = result.history_error.expect("history write should fail");
        assert!(reason.contains("history"), "{reason}");
    }

    #[tokio::test]
    async fn recorded_run_has_no_history_error() {
        let base = tempfile::tempdir().unwrap();
        let result = engine(base.path(), 10).run(&task("fine", "true")).await;
        assert!(result.history_error.is_none());
    }

    #[tokio::test]
    async fn working_dir_is_created_and_used() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 10);
        let wd = base.path().join("work/area");
        let mut t = task("wd", "pwd");
        t.working_dir = Some(wd.to_string_lossy().into_owned());

        let result = engine.run(&t).await;
        assert!(result.success);
        assert!(wd.is_dir());
        assert!(result.output.contains(&*wd.to_string_lossy()));
    }

    #[tokio::test]
    async fn nightly_backup_stub_run() {
        let base = tempfile::tempdir().unwrap();
        let engine = engine(base.path(), 10);
        let mut t = task("nightly-backup", "tar czf /backup.tgz /data");
        t.command = "echo backup complete".to_string();

        engine.run(&t).await;

        let recent = engine.history().recent("nightly-backup", 1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, RunStatus::Success);
        match latest(engine.layout(), "nightly-backup").await.unwrap() {
            LatestLog::Found { content, .. } => assert!(content.contains("backup complete")),
            LatestLog::Empty => panic!("expected a log file"),
        }
    }

    #[tokio::test]
    async fn same_second_runs_get_distinct_logs() {
        let base = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine(base.path(), 10));
        let t = task("burst", "echo tick");

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let t = t.clone();
                tokio::spawn(async move { engine.run(&t).await })
            })
            .collect();
        let mut files = Vec::new();
        for h in handles {
            files.push(h.await.unwrap().log_file);
        }
        files.sort();
        files.dedup();
        assert_eq!(files.len(), 3);
        assert_eq!(engine.history().recent("burst", 10).unwrap().len(), 3);
    }

    #[test]
    fn collision_suffix_sorts_between_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let first = fresh_log_path(dir.path(), "20250101_020000");
        std::fs::write(&first, "").unwrap();
        let second = fresh_log_path(dir.path(), "20250101_020000");
        assert!(second.ends_with("20250101_020000_01.log"));

        let next_second = dir.path().join("20250101_020001.log");
        assert!(first < second && second < next_second);
    }
}
