//! POSIX variant: the user's crontab.
//!
//! `crontab` only supports whole-table replacement, so every change is a
//! read → edit → write cycle over the full content. The cycle runs under one
//! mutex per scheduler instance; the process builds exactly one instance, so
//! two saves can never interleave and drop each other's entry.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use crondeck_core::types::Task;
use tracing::{debug, info, warn};

use crate::{
    backend::{check_status, run_tool, NativeScheduler},
    error::{CronError, Result},
    script::ScriptGenerator,
    table,
};

/// Whole-table access to a crontab.
pub trait TableIo: Send + Sync {
    /// Full current content. A missing table reads as empty.
    fn read(&self) -> Result<String>;

    /// Replace the full content.
    fn write(&self, content: &str) -> Result<()>;
}

/// The real `crontab` binary for the current user.
#[derive(Debug, Clone)]
pub struct CrontabCommand {
    program: String,
}

impl Default for CrontabCommand {
    fn default() -> Self {
        Self {
            program: "crontab".to_string(),
        }
    }
}

impl CrontabCommand {
    /// Use a specific binary (e.g. an absolute path) instead of `crontab`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TableIo for CrontabCommand {
    fn read(&self) -> Result<String> {
        let output = run_tool(&self.program, &["-l"])?;
        if !output.status.success() {
            // "no crontab for <user>" and friends: start from an empty table.
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "crontab -l failed; treating table as empty"
            );
            return Ok(String::new());
        }
        match String::from_utf8(output.stdout) {
            Ok(s) => Ok(s),
            Err(e) => {
                warn!("crontab content is not valid UTF-8; decoding lossily");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CronError::ToolUnavailable {
                tool: self.program.clone(),
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        check_status(&self.program, &output)
    }
}

/// In-process table, used by tests and by callers that want to preview edits.
#[derive(Debug, Default)]
pub struct MemoryTable {
    content: Mutex<String>,
    writes: Mutex<usize>,
}

impl MemoryTable {
    pub fn new(initial: &str) -> Self {
        Self {
            content: Mutex::new(initial.to_string()),
            writes: Mutex::new(0),
        }
    }

    pub fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }

    /// Number of whole-table writes so far.
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl TableIo for MemoryTable {
    fn read(&self) -> Result<String> {
        Ok(self.content())
    }

    fn write(&self, content: &str) -> Result<()> {
        *self.content.lock().unwrap() = content.to_string();
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

pub struct CrontabScheduler<T: TableIo> {
    io: T,
    scripts: ScriptGenerator,
    /// Guards the read-modify-write cycle over the shared table.
    lock: Mutex<()>,
}

impl<T: TableIo> CrontabScheduler<T> {
    pub fn new(io: T, scripts: ScriptGenerator) -> Self {
        Self {
            io,
            scripts,
            lock: Mutex::new(()),
        }
    }

    pub fn io(&self) -> &T {
        &self.io
    }

    /// Rewrite the table only when the edit changed some line.
    ///
    /// Compared line by line, so a table saved without a final newline is
    /// left byte-for-byte alone when nothing changed.
    fn commit(&self, current: &str, lines: &[String]) -> Result<bool> {
        if lines == table::parse(current).as_slice() {
            return Ok(false);
        }
        self.io.write(&table::render(lines))?;
        Ok(true)
    }
}

impl<T: TableIo> NativeScheduler for CrontabScheduler<T> {
    fn name(&self) -> &'static str {
        "crontab"
    }

    fn install(&self, task: &Task) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.io.read()?;
        let mut lines = table::strip_entry(&table::parse(&current), &task.name);
        let script = self.scripts.generate(task)?;
        table::append_entry(&mut lines, task, &script);

        if self.commit(&current, &lines)? {
            info!(task = %task.name, schedule = %task.schedule, "crontab entry installed");
        } else {
            debug!(task = %task.name, "crontab entry already current");
        }
        Ok(())
    }

    fn remove(&self, task_name: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.io.read()?;
        let lines = table::strip_entry(&table::parse(&current), task_name);
        let removed = self.commit(&current, &lines)?;
        if removed {
            info!(task = %task_name, "crontab entry removed");
        }
        Ok(removed)
    }

    fn query(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(table::parse(&self.io.read()?))
    }

    fn scripts(&self) -> &ScriptGenerator {
        &self.scripts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptFlavor;
    use crondeck_core::layout::Layout;
    use crondeck_core::types::TaskDefinition;
    use std::sync::Arc;

    const FOREIGN: &str = "MAILTO=ops@example.com\n30 4 * * 1 /opt/E.sh --weekly\n";

    fn task(name: &str, schedule: &str) -> Task {
        Task::from_definition(TaskDefinition {
            name: name.to_string(),
            schedule: schedule.to_string(),
            command: format!("echo {name}"),
            description: format!("{name} job"),
            working_dir: None,
        })
    }

    fn scheduler(initial: &str) -> (tempfile::TempDir, CrontabScheduler<MemoryTable>) {
        let base = tempfile::tempdir().unwrap();
        let scripts = ScriptGenerator::new(Layout::new(base.path()), ScriptFlavor::Posix);
        (base, CrontabScheduler::new(MemoryTable::new(initial), scripts))
    }

    #[test]
    fn install_is_idempotent() {
        let (_base, s) = scheduler(FOREIGN);
        let t = task("nightly-backup", "0 2 * * *");

        s.install(&t).unwrap();
        let after_first = s.io().content();
        s.install(&t).unwrap();

        assert_eq!(s.io().content(), after_first);
        assert_eq!(s.io().writes(), 1);
        assert_eq!(after_first.matches("# crondeck: nightly-backup ").count(), 1);
        assert!(after_first.starts_with(FOREIGN));
    }

    #[test]
    fn install_replaces_changed_entry() {
        let (_base, s) = scheduler("");
        s.install(&task("job", "0 2 * * *")).unwrap();
        s.install(&task("job", "*/10 * * * *")).unwrap();

        let lines = table::parse(&s.io().content());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("*/10 * * * * '"));
        assert!(lines[1].ends_with("/scripts/job.sh'"));
    }

    #[test]
    fn remove_isolates_foreign_entries() {
        let initial = "15 * * * * /usr/bin/E\n";
        let (_base, s) = scheduler(initial);
        s.install(&task("A", "@hourly")).unwrap();
        let foreign_after = "15 * * * * /usr/bin/E\n# trailing note\n";
        s.io().write(&format!("{}# trailing note\n", s.io().content())).unwrap();

        assert!(s.remove("A").unwrap());
        assert_eq!(s.io().content(), foreign_after);
    }

    #[test]
    fn remove_is_prefix_safe() {
        let (_base, s) = scheduler("");
        s.install(&task("backup", "0 1 * * *")).unwrap();
        s.install(&task("backup2", "0 2 * * *")).unwrap();

        assert!(s.remove("backup").unwrap());
        let content = s.io().content();
        assert!(content.contains("# crondeck: backup2 - backup2 job"));
        assert!(content.contains("/scripts/backup2.sh'"));
        assert!(!content.contains("# crondeck: backup - "));
    }

    #[test]
    fn remove_noop_does_not_rewrite() {
        let (_base, s) = scheduler(FOREIGN);
        assert!(!s.remove("ghost").unwrap());
        assert_eq!(s.io().writes(), 0);
        assert_eq!(s.io().content(), FOREIGN);
    }

    #[test]
    fn unterminated_table_is_left_alone_by_noop_edits() {
        let (_base, s) = scheduler("15 * * * * /x");
        assert!(!s.remove("ghost").unwrap());
        assert_eq!(s.io().writes(), 0);
        assert_eq!(s.io().content(), "15 * * * * /x");

        s.install(&task("a", "@daily")).unwrap();
        let content = s.io().content();
        assert!(content.starts_with("15 * * * * /x\n"), "{content}");
        assert_eq!(s.io().writes(), 1);

        s.install(&task("a", "@daily")).unwrap();
        assert_eq!(s.io().writes(), 1);
    }

    #[test]
    fn query_returns_every_line() {
        let (_base, s) = scheduler(FOREIGN);
        s.install(&task("a", "@daily")).unwrap();
        let lines = s.query().unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(table::managed_names(&lines), vec!["a"]);
    }

    /// Table whose read and write are far apart, to widen any race window.
    struct SlowTable(MemoryTable);

    impl TableIo for SlowTable {
        fn read(&self) -> Result<String> {
            let content = self.0.read()?;
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(content)
        }
        fn write(&self, content: &str) -> Result<()> {
            self.0.write(content)
        }
    }

    #[test]
    fn concurrent_installs_keep_both_entries() {
        let base = tempfile::tempdir().unwrap();
        let scripts = ScriptGenerator::new(Layout::new(base.path()), ScriptFlavor::Posix);
        let s = Arc::new(CrontabScheduler::new(SlowTable(MemoryTable::new(FOREIGN)), scripts));

        let handles: Vec<_> = ["first", "second", "third", "fourth"]
            .into_iter()
            .map(|name| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || s.install(&task(name, "* * * * *")).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let lines = table::parse(&s.io().0.content());
        let mut names = table::managed_names(&lines);
        names.sort();
        assert_eq!(names, vec!["first", "fourth", "second", "third"]);
        assert_eq!(&lines[..2], &table::parse(FOREIGN)[..]);
    }
}
