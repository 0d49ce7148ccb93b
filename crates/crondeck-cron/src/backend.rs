use std::process::{Command, Output};
use std::sync::Arc;

use crondeck_core::layout::Layout;
use crondeck_core::types::Task;
use tracing::{info, warn};

use crate::{
    crontab::{CrontabCommand, CrontabScheduler},
    error::{CronError, Result},
    schtasks::SchtasksScheduler,
    script::{ScriptFlavor, ScriptGenerator},
};

/// Capability set every platform scheduler variant provides.
///
/// Implementations own the shared native state and must serialize their own
/// read-modify-write cycles; callers may invoke these concurrently.
pub trait NativeScheduler: Send + Sync {
    /// Short identifier for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Remove any existing entry for `task`, regenerate its wrapper and
    /// install a fresh entry.
    fn install(&self, task: &Task) -> Result<()>;

    /// Remove the entry for `task_name`. Returns `false` when none existed.
    fn remove(&self, task_name: &str) -> Result<bool>;

    /// Current native entries, managed and foreign, as display lines.
    fn query(&self) -> Result<Vec<String>>;

    /// Wrapper script generator used by this variant.
    fn scripts(&self) -> &ScriptGenerator;
}

/// Pick the scheduler variant for the platform this process runs on.
pub fn detect(layout: &Layout) -> Arc<dyn NativeScheduler> {
    let scripts = ScriptGenerator::new(layout.clone(), ScriptFlavor::native());
    if cfg!(windows) {
        info!("native scheduler: Windows Task Scheduler (schtasks)");
        Arc::new(SchtasksScheduler::new(scripts))
    } else {
        match which::which("crontab") {
            Ok(path) => info!(path = %path.display(), "native scheduler: crontab"),
            Err(e) => warn!("crontab not found on PATH ({e}); schedule sync will fail"),
        }
        Arc::new(CrontabScheduler::new(CrontabCommand::default(), scripts))
    }
}

/// Run a scheduler tool to completion, mapping spawn failures to
/// [`CronError::ToolUnavailable`].
pub(crate) fn run_tool(tool: &str, args: &[&str]) -> Result<Output> {
    Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| CronError::ToolUnavailable {
            tool: tool.to_string(),
            reason: e.to_string(),
        })
}

/// Turn a nonzero exit into [`CronError::ToolFailed`].
pub(crate) fn check_status(tool: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(CronError::ToolFailed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
