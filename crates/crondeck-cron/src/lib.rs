//! `crondeck-cron`: mirrors stored tasks into the host's native scheduler.
//!
//! # Overview
//!
//! Every platform variant implements [`NativeScheduler`] (install / remove /
//! query). The variant is chosen once at startup by [`detect`]:
//!
//! | Platform | Variant               | Native state                         |
//! |----------|-----------------------|--------------------------------------|
//! | POSIX    | [`CrontabScheduler`]  | the user's crontab, whole-table I/O  |
//! | Windows  | [`SchtasksScheduler`] | `\crondeck\` folder of Task Scheduler |
//!
//! The native scheduler never runs the user's command directly; it runs a
//! wrapper script produced by [`ScriptGenerator`] which handles the working
//! directory and per-run log files.

pub mod backend;
pub mod crontab;
pub mod error;
pub mod schtasks;
pub mod script;
pub mod table;

pub use backend::{detect, NativeScheduler};
pub use crontab::{CrontabCommand, CrontabScheduler, MemoryTable, TableIo};
pub use error::{CronError, Result};
pub use schtasks::SchtasksScheduler;
pub use script::{ScriptFlavor, ScriptGenerator};
