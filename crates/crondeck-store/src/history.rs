use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use crondeck_core::types::{now_run_time, ExecutionRecord, RunStatus};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::{
    db::init_db,
    error::{Result, StoreError},
};

/// Append-only log of execution attempts with bounded per-task retention.
pub struct HistoryStore {
    db: Mutex<Connection>,
    /// Records kept per task; 0 disables pruning.
    retention: usize,
}

impl HistoryStore {
    pub fn new(conn: Connection, retention: usize) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            retention,
        })
    }

    /// Record a run attempt stamped with the current local time.
    ///
    /// Never checks that `task_name` exists: history may reference a task
    /// that has since been deleted.
    pub fn append(
        &self,
        task_name: &str,
        status: RunStatus,
        output: &str,
        log_file: Option<&str>,
    ) -> Result<ExecutionRecord> {
        self.append_at(task_name, &now_run_time(), status, output, log_file)
    }

    /// Like [`append`](Self::append) with an explicit `run_time`.
    pub fn append_at(
        &self,
        task_name: &str,
        run_time: &str,
        status: RunStatus,
        output: &str,
        log_file: Option<&str>,
    ) -> Result<ExecutionRecord> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO history (task_name, run_time, status, output, log_file)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![task_name, run_time, status.to_string(), output, log_file],
        )?;
        let id = db.last_insert_rowid();

        if self.retention > 0 {
            let pruned = db.execute(
                "DELETE FROM history
                 WHERE task_name = ?1 AND id NOT IN (
                     SELECT id FROM history WHERE task_name = ?1
                     ORDER BY run_time DESC, id DESC
                     LIMIT ?2
                 )",
                rusqlite::params![task_name, self.retention as i64],
            )?;
            if pruned > 0 {
                debug!(task = %task_name, pruned, "history pruned to retention");
            }
        }

        Ok(ExecutionRecord {
            id,
            task_name: task_name.to_string(),
            run_time: run_time.to_string(),
            status,
            output: output.to_string(),
            log_file: log_file.map(str::to_string),
        })
    }

    /// The `limit` most recent records for `task_name`, newest first.
    pub fn recent(&self, task_name: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT id, task_name, run_time, status, output, log_file FROM history
             WHERE task_name = ?1
             ORDER BY run_time DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![task_name, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,            // id
                    row.get::<_, String>(1)?,         // task_name
                    row.get::<_, String>(2)?,         // run_time
                    row.get::<_, String>(3)?,         // status
                    row.get::<_, String>(4)?,         // output
                    row.get::<_, Option<String>>(5)?, // log_file
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, task_name, run_time, status, output, log_file)| -> Result<ExecutionRecord> {
                let status: RunStatus = status.parse().map_err(StoreError::Corrupt)?;
                Ok(ExecutionRecord {
                    id,
                    task_name,
                    run_time,
                    status,
                    output,
                    log_file,
                })
            })
            .collect()
    }

    /// Newest `run_time` recorded for `task_name`.
    pub fn last_run(&self, task_name: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let last = db.query_row(
            "SELECT MAX(run_time) FROM history WHERE task_name = ?1",
            [task_name],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(last)
    }

    /// Distinct task names with at least one record on `date`.
    pub fn ran_on(&self, date: NaiveDate) -> Result<BTreeSet<String>> {
        let start = format!("{} 00:00:00", date.format("%Y-%m-%d"));
        // The first second of the next day bounds the range; dates at the end
        // of chrono's calendar fall back to a bound above any time string.
        let end = date
            .succ_opt()
            .map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| format!("{} 99", date.format("%Y-%m-%d")));

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT DISTINCT task_name FROM history
             WHERE run_time >= ?1 AND run_time < ?2",
        )?;
        let names = stmt
            .query_map(rusqlite::params![start, end], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    /// Drop every record of `task_name` (cascade cleanup on task deletion).
    pub fn delete_for(&self, task_name: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM history WHERE task_name = ?1", [task_name])?;
        info!(task = %task_name, removed = n, "history cleared");
        Ok(n)
    }
}
