//! Wrapper script generation.
//!
//! The native scheduler invokes `scripts/<task>.sh` (or `.cmd`), never the raw
//! command. The wrapper enters the working directory, stamps a fresh
//! `logs/<task>/<timestamp>.log` and runs the command through the shell with
//! stdout and stderr both redirected into it.

use std::fs;
use std::path::{Path, PathBuf};

use crondeck_core::layout::Layout;
use crondeck_core::types::Task;
use tracing::{debug, info};

use crate::error::Result;

/// Which shell dialect the wrapper is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `/bin/sh` script, invoked from crontab.
    Posix,
    /// `cmd.exe` batch file, invoked from Task Scheduler.
    Cmd,
}

impl ScriptFlavor {
    /// Flavor for the platform this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Cmd
        } else {
            ScriptFlavor::Posix
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ScriptFlavor::Posix => "sh",
            ScriptFlavor::Cmd => "cmd",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    layout: Layout,
    flavor: ScriptFlavor,
}

impl ScriptGenerator {
    pub fn new(layout: Layout, flavor: ScriptFlavor) -> Self {
        Self { layout, flavor }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn script_path(&self, task_name: &str) -> PathBuf {
        self.layout
            .script_path(task_name, self.flavor.extension())
    }

    /// Write (or overwrite in place) the wrapper for `task` and return its path.
    ///
    /// Also creates the task's log directory so the first scheduled run does
    /// not depend on the wrapper's own `mkdir`.
    pub fn generate(&self, task: &Task) -> Result<PathBuf> {
        let path = self.script_path(&task.name);
        let log_dir = self.layout.log_dir(&task.name);
        let working_dir = self.layout.working_dir(task);

        fs::create_dir_all(self.layout.scripts_root())?;
        fs::create_dir_all(&log_dir)?;

        let body = match self.flavor {
            ScriptFlavor::Posix => render_posix(task, &working_dir, &log_dir),
            ScriptFlavor::Cmd => render_cmd(task, &working_dir, &log_dir),
        };
        fs::write(&path, body)?;
        make_executable(&path)?;

        info!(task = %task.name, path = %path.display(), "wrapper script written");
        Ok(path)
    }

    /// Delete the wrapper for `task_name`. Returns `false` if there was none.
    pub fn remove(&self, task_name: &str) -> Result<bool> {
        let path = self.script_path(task_name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(task = %task_name, path = %path.display(), "wrapper script removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Quote `s` as a single POSIX shell word.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn render_posix(task: &Task, working_dir: &Path, log_dir: &Path) -> String {
    let command = sh_quote(&task.command);
    format!(
        r#"#!/bin/sh
# crondeck wrapper for task: {name} (regenerated on every save)
cd {wd} || exit 1
LOG_DIR={log_dir}
mkdir -p "$LOG_DIR" || exit 1
TIMESTAMP=$(date +%Y%m%d_%H%M%S)
LOG_FILE="$LOG_DIR/$TIMESTAMP.log"
printf '[%s] Command: %s\n' "$(date '+%Y-%m-%d %H:%M:%S')" {command} >> "$LOG_FILE"
/bin/sh -c {command} >> "$LOG_FILE" 2>&1
STATUS=$?
printf 'Return code: %s\n' "$STATUS" >> "$LOG_FILE"
exit "$STATUS"
"#,
        name = task.name,
        wd = sh_quote(&working_dir.to_string_lossy()),
        log_dir = sh_quote(&log_dir.to_string_lossy()),
    )
}

/// Batch files expand `%`; double it so the command reaches cmd.exe as typed.
fn cmd_escape(s: &str) -> String {
    s.replace('%', "%%")
}

fn render_cmd(task: &Task, working_dir: &Path, log_dir: &Path) -> String {
    format!(
        "@echo off\r\n\
rem crondeck wrapper for task: {name} (regenerated on every save)\r\n\
cd /d \"{wd}\" || exit /b 1\r\n\
set \"LOG_DIR={log_dir}\"\r\n\
if not exist \"%LOG_DIR%\" mkdir \"%LOG_DIR%\"\r\n\
for /f %%i in ('powershell -NoProfile -Command \"Get-Date -Format yyyyMMdd_HHmmss\"') do set \"TIMESTAMP=%%i\"\r\n\
set \"LOG_FILE=%LOG_DIR%\\%TIMESTAMP%.log\"\r\n\
echo [%DATE% %TIME%] Command: {command}>> \"%LOG_FILE%\"\r\n\
cmd /C \"{command}\" >> \"%LOG_FILE%\" 2>&1\r\n\
set STATUS=%ERRORLEVEL%\r\n\
echo Return code: %STATUS%>> \"%LOG_FILE%\"\r\n\
exit /b %STATUS%\r\n",
        name = task.name,
        wd = cmd_escape(&working_dir.to_string_lossy()),
        log_dir = cmd_escape(&log_dir.to_string_lossy()),
        command = cmd_escape(&task.command),
    )
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
