use std::collections::BTreeMap;
use std::sync::Mutex;

use crondeck_core::types::Task;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::{db::init_db, error::Result};

const TASK_SELECT_SQL: &str = "SELECT name, schedule, command, description, working_dir,
        created_at, updated_at
 FROM tasks";

/// Persistent table of task definitions keyed by unique name.
///
/// Wraps a single SQLite connection in a `Mutex`; reads always see the
/// latest committed write.
pub struct TaskStore {
    db: Mutex<Connection>,
}

impl TaskStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert or fully replace the task keyed by `task.name`.
    ///
    /// An existing row keeps its original `created_at`.
    #[instrument(skip(self, task), fields(task = %task.name))]
    pub fn upsert(&self, task: &Task) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks
             (name, schedule, command, description, working_dir, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                schedule    = excluded.schedule,
                command     = excluded.command,
                description = excluded.description,
                working_dir = excluded.working_dir,
                updated_at  = excluded.updated_at",
            rusqlite::params![
                task.name,
                task.schedule,
                task.command,
                task.description,
                task.working_dir,
                task.created_at,
                task.updated_at,
            ],
        )?;
        debug!("task upserted");
        Ok(())
    }

    /// Fetch one task, `None` if the name is unknown.
    pub fn get(&self, name: &str) -> Result<Option<Task>> {
        let db = self.db.lock().unwrap();
        let task = db
            .query_row(
                &format!("{TASK_SELECT_SQL} WHERE name = ?1"),
                [name],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// All tasks keyed by name.
    pub fn list(&self) -> Result<BTreeMap<String, Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!("{TASK_SELECT_SQL} ORDER BY name"))?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks.into_iter().map(|t| (t.name.clone(), t)).collect())
    }

    /// Delete a task. Returns `false` when no row matched.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM tasks WHERE name = ?1", [name])?;
        if n > 0 {
            info!(task = %name, "task deleted");
        }
        Ok(n > 0)
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        name: row.get(0)?,
        schedule: row.get(1)?,
        command: row.get(2)?,
        description: row.get(3)?,
        working_dir: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
