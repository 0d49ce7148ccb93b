//! `crondeck-runner`: on-demand task execution and per-run log access.
//!
//! The native scheduler never goes through this crate; it fires the wrapper
//! scripts directly. [`ExecutionEngine::run`] is the "run now" path: it
//! executes the command under the same shell the wrapper would use, writes a
//! log file into the same directory and records the attempt in history.

pub mod engine;
pub mod error;
pub mod exec;
pub mod logs;
pub mod truncate;

pub use engine::ExecutionEngine;
pub use error::{Result, RunnerError};
pub use logs::LatestLog;
