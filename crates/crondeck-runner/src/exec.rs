//! One-shot subprocess execution with a hard deadline.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    error::{Result, RunnerError},
    truncate::truncate_middle,
};

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// `None` when the process was terminated by a signal.
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// `sh -c <command>`, or `cmd /C <command>` on Windows.
///
/// The wrapper scripts use the same interpreter, so a task behaves the same
/// whether the native scheduler fires it or it is run on demand.
pub fn shell_command(command: &str) -> Command {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut cmd = Command::new(shell);
    cmd.arg(flag).arg(command);
    cmd
}

/// Run `command` in `working_dir`, capturing stdout and stderr separately.
///
/// The shell leads its own process group. When `timeout` expires the whole
/// group is killed, so anything the command forked stops with it. Output is
/// stripped of ANSI escapes and middle-truncated to `max_output_chars`.
///
/// # Errors
///
/// - `Spawn`: the shell could not be started (e.g. missing working dir).
/// - `Timeout`: the deadline expired; the process tree has been killed.
/// - `Io`: waiting on the child failed.
pub async fn run_command(
    command: &str,
    working_dir: &Path,
    timeout: Duration,
    max_output_chars: usize,
) -> Result<ExecOutput> {
    debug!(command = %command, cwd = %working_dir.display(), "exec");

    let mut cmd = shell_command(command);
    cmd.current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd
        .spawn()
        .map_err(|e| RunnerError::Spawn(e.to_string()))?;
    let pid = child.id();

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    match tokio::time::timeout(timeout, &mut wait).await {
        Ok(Ok(output)) => Ok(ExecOutput {
            return_code: output.status.code(),
            stdout: truncate_middle(&strip_text(&output.stdout), max_output_chars),
            stderr: truncate_middle(&strip_text(&output.stderr), max_output_chars),
        }),
        Ok(Err(e)) => Err(RunnerError::Io(e)),
        Err(_elapsed) => {
            if let Some(pid) = pid {
                kill_tree(pid);
            }
            warn!(command = %command, secs = timeout.as_secs(), "command timed out; process tree killed");
            Err(RunnerError::Timeout {
                secs: timeout.as_secs(),
            })
        }
    }
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn kill_tree(pid: u32) {
    // SAFETY: `pid` leads a group created by `process_group(0)` for this run,
    // and the child has not been reaped while the wait future is alive.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, "process group already gone");
    }
}

/// `taskkill /T` walks the child tree of `pid`.
#[cfg(not(unix))]
fn kill_tree(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .output();
}

/// Strip ANSI escape sequences and decode as UTF-8 (lossy).
fn strip_text(bytes: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(bytes);
    String::from_utf8_lossy(&stripped).into_owned()
}
