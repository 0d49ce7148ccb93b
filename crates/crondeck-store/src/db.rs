use rusqlite::Connection;

use crate::error::Result;

/// Initialise the store schema in `conn`. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_tasks_table(conn)?;
    create_history_table(conn)?;
    Ok(())
}

fn create_tasks_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            name        TEXT    NOT NULL PRIMARY KEY,
            schedule    TEXT    NOT NULL,
            command     TEXT    NOT NULL,
            description TEXT    NOT NULL DEFAULT '',
            working_dir TEXT,               -- NULL means the base directory
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;",
    )?;
    Ok(())
}

/// No foreign key to `tasks`: records outlive the task they describe.
fn create_history_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            task_name   TEXT    NOT NULL,
            run_time    TEXT    NOT NULL,   -- %Y-%m-%d %H:%M:%S, local time
            status      TEXT    NOT NULL,   -- 'success' | 'failed'
            output      TEXT    NOT NULL DEFAULT '',
            log_file    TEXT
        ) STRICT;

        -- recent(task, n): newest first per task
        CREATE INDEX IF NOT EXISTS idx_history_task_time
            ON history (task_name, run_time DESC, id DESC);

        -- ran_on(date): range scan over run_time
        CREATE INDEX IF NOT EXISTS idx_history_run_time
            ON history (run_time);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('tasks', 'history')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 2);
    }
}
