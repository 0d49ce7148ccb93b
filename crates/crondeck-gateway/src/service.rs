//! Task lifecycle operations.
//!
//! Every mutation writes the store first and then pushes the change to the
//! native scheduler. A scheduler failure after a successful store write does
//! not roll back; it comes back as [`MutationOutcome::scheduler_warning`] so
//! the caller knows which half failed, and `resync` repairs it later.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Local;
use crondeck_core::{
    config::CrondeckConfig,
    error::{CrondeckError, Result},
    layout::Layout,
    types::{ExecutionRecord, ExecutionResult, Task, TaskDefinition, TaskSummary},
    validate::{validate_definition, validate_name},
};
use crondeck_cron::NativeScheduler;
use crondeck_runner::{logs, ExecutionEngine, LatestLog};
use crondeck_store::{HistoryStore, TaskStore};
use serde::Serialize;
use tracing::{info, warn};

/// Result of a create, update or delete.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub task: Task,
    /// Set when the store changed but the native scheduler could not follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler_warning: Option<String>,
    /// Set when a cascading delete removed the task but left history or logs behind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_warning: Option<String>,
}

/// Dashboard view: every task with its latest run facts, plus the raw
/// native scheduler entries.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub scheduler: &'static str,
    pub tasks: Vec<TaskSummary>,
    pub native_entries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub installed: Vec<String>,
    /// `(task, error)` for every task the scheduler rejected.
    pub failed: Vec<(String, String)>,
}

pub struct TaskService {
    tasks: TaskStore,
    history: Arc<HistoryStore>,
    scheduler: Arc<dyn NativeScheduler>,
    engine: ExecutionEngine,
    enforce_safety: bool,
    cascade_delete: bool,
    history_retention: usize,
    /// Serializes check-then-write sequences on the task store.
    mutations: Mutex<()>,
}

impl TaskService {
    pub fn new(
        config: &CrondeckConfig,
        tasks: TaskStore,
        history: Arc<HistoryStore>,
        scheduler: Arc<dyn NativeScheduler>,
    ) -> Self {
        let engine = ExecutionEngine::new(
            Layout::new(&config.paths.base_dir),
            Arc::clone(&history),
            config.execution.clone(),
        );
        Self {
            tasks,
            history,
            scheduler,
            engine,
            enforce_safety: config.execution.enforce_safety,
            cascade_delete: config.tasks.cascade_delete,
            history_retention: config.history.retention,
            mutations: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &Layout {
        self.engine.layout()
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.name()
    }

    /// History length returned when the caller does not ask for one.
    pub fn default_history_limit(&self) -> usize {
        if self.history_retention == 0 {
            crondeck_core::config::DEFAULT_HISTORY_RETENTION
        } else {
            self.history_retention
        }
    }

    pub fn create_task(&self, def: TaskDefinition) -> Result<MutationOutcome> {
        validate_definition(&def, self.enforce_safety)?;
        let _guard = self.mutations.lock().unwrap();

        if self.tasks.get(&def.name)?.is_some() {
            return Err(CrondeckError::Validation(format!(
                "task '{}' already exists",
                def.name
            )));
        }
        let task = Task::from_definition(def);
        self.tasks.upsert(&task)?;
        info!(task = %task.name, "task created");

        let scheduler_warning = self.push(&task);
        Ok(MutationOutcome {
            task,
            scheduler_warning,
            cleanup_warning: None,
        })
    }

    /// Full replace of an existing task. The name itself cannot change.
    pub fn update_task(&self, name: &str, mut def: TaskDefinition) -> Result<MutationOutcome> {
        if def.name.is_empty() {
            def.name = name.to_string();
        } else if def.name != name {
            return Err(CrondeckError::Validation(format!(
                "cannot rename '{name}' to '{}'; delete and recreate instead",
                def.name
            )));
        }
        validate_definition(&def, self.enforce_safety)?;
        let _guard = self.mutations.lock().unwrap();

        let existing = self
            .tasks
            .get(name)?
            .ok_or_else(|| CrondeckError::not_found(name))?;
        let task = Task {
            created_at: existing.created_at,
            ..Task::from_definition(def)
        };
        self.tasks.upsert(&task)?;
        info!(task = %task.name, "task updated");

        let scheduler_warning = self.push(&task);
        Ok(MutationOutcome {
            task,
            scheduler_warning,
            cleanup_warning: None,
        })
    }

    /// Remove the task, its native entry and its wrapper script.
    ///
    /// History and logs stay unless `tasks.cascade_delete` is set.
    pub fn delete_task(&self, name: &str) -> Result<MutationOutcome> {
        validate_name(name)?;
        let _guard = self.mutations.lock().unwrap();

        let task = self
            .tasks
            .get(name)?
            .ok_or_else(|| CrondeckError::not_found(name))?;
        self.tasks.delete(name)?;
        info!(task = %name, "task deleted");

        let scheduler_warning = match self.scheduler.remove(name) {
            Ok(_) => None,
            Err(e) => {
                let e = CrondeckError::from(e);
                warn!(task = %name, "scheduler entry not removed: {e}");
                Some(e.to_string())
            }
        };
        if let Err(e) = self.scheduler.scripts().remove(name) {
            warn!(task = %name, "wrapper script not removed: {e}");
        }

        let cleanup_warning = if self.cascade_delete {
            self.purge_run_data(name)
        } else {
            None
        };

        Ok(MutationOutcome {
            task,
            scheduler_warning,
            cleanup_warning,
        })
    }

    /// Drop history rows and the log directory of a deleted task.
    ///
    /// The task row is already gone, so failures here are reported, not raised.
    fn purge_run_data(&self, name: &str) -> Option<String> {
        let mut problems = Vec::new();
        if let Err(e) = self.history.delete_for(name) {
            warn!(task = %name, "history not removed: {e}");
            problems.push(format!("history not removed: {e}"));
        }
        let log_dir = self.layout().log_dir(name);
        match std::fs::remove_dir_all(&log_dir) {
            Ok(()) => info!(task = %name, "log directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(task = %name, path = %log_dir.display(), "log directory not removed: {e}");
                problems.push(format!("log directory {} not removed: {e}", log_dir.display()));
            }
        }
        (!problems.is_empty()).then(|| problems.join("; "))
    }

    pub fn list_tasks(&self) -> Result<BTreeMap<String, Task>> {
        Ok(self.tasks.list()?)
    }

    pub fn get_task(&self, name: &str) -> Result<Task> {
        self.tasks
            .get(name)?
            .ok_or_else(|| CrondeckError::not_found(name))
    }

    pub fn overview(&self) -> Result<Overview> {
        let ran_today = self.history.ran_on(Local::now().date_naive())?;
        let tasks = self
            .tasks
            .list()?
            .into_values()
            .map(|task| -> Result<TaskSummary> {
                let last_run = self.history.last_run(&task.name)?;
                Ok(TaskSummary {
                    ran_today: ran_today.contains(&task.name),
                    last_run,
                    task,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (native_entries, native_error) = match self.scheduler.query() {
            Ok(lines) => (lines, None),
            Err(e) => {
                warn!("native scheduler query failed: {e}");
                (Vec::new(), Some(CrondeckError::from(e).to_string()))
            }
        };

        Ok(Overview {
            scheduler: self.scheduler.name(),
            tasks,
            native_entries,
            native_error,
        })
    }

    pub async fn run_task(&self, name: &str) -> Result<ExecutionResult> {
        let task = self.get_task(name)?;
        Ok(self.engine.run(&task).await)
    }

    pub async fn get_log(&self, name: &str) -> Result<LatestLog> {
        validate_name(name)?;
        Ok(logs::latest(self.layout(), name).await?)
    }

    /// Most recent `limit` records, newest first. Unknown names yield an
    /// empty list; history outlives its task.
    pub fn get_history(&self, name: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
        Ok(self.history.recent(name, limit)?)
    }

    /// Re-install every stored task into the native scheduler.
    pub fn resync(&self) -> Result<SyncReport> {
        let _guard = self.mutations.lock().unwrap();
        let mut report = SyncReport::default();
        for task in self.tasks.list()?.into_values() {
            match self.scheduler.install(&task) {
                Ok(()) => report.installed.push(task.name),
                Err(e) => {
                    warn!(task = %task.name, "resync failed: {e}");
                    report.failed.push((task.name, e.to_string()));
                }
            }
        }
        info!(
            installed = report.installed.len(),
            failed = report.failed.len(),
            "native scheduler resynced"
        );
        Ok(report)
    }

    fn push(&self, task: &Task) -> Option<String> {
        match self.scheduler.install(task) {
            Ok(()) => None,
            Err(e) => {
                let e = CrondeckError::from(e);
                warn!(task = %task.name, "scheduler sync failed: {e}");
                Some(e.to_string())
            }
        }
    }
}
