//! Windows variant: named tasks in the Task Scheduler.
//!
//! Entries live under the `\crondeck\` folder so `query` never reports tasks
//! crondeck did not create, and `remove` can only ever touch its own names.
//! The registry has per-entry operations, but install still runs
//! remove-if-present → regenerate wrapper → create, under one mutex.

use std::sync::Mutex;

use crondeck_core::types::Task;
use tracing::{debug, info};

use crate::{
    backend::{check_status, run_tool, NativeScheduler},
    error::{CronError, Result},
    script::ScriptGenerator,
};

const TOOL: &str = "schtasks";
/// Task Scheduler folder holding every managed entry.
pub const FOLDER: &str = r"\crondeck\";

pub struct SchtasksScheduler {
    scripts: ScriptGenerator,
    lock: Mutex<()>,
}

impl SchtasksScheduler {
    pub fn new(scripts: ScriptGenerator) -> Self {
        Self {
            scripts,
            lock: Mutex::new(()),
        }
    }

    fn exists(&self, registry_name: &str) -> Result<bool> {
        let output = run_tool(TOOL, &["/Query", "/TN", registry_name])?;
        Ok(output.status.success())
    }

    fn delete(&self, registry_name: &str) -> Result<bool> {
        if !self.exists(registry_name)? {
            return Ok(false);
        }
        let output = run_tool(TOOL, &["/Delete", "/TN", registry_name, "/F"])?;
        check_status(TOOL, &output)?;
        Ok(true)
    }
}

/// `\crondeck\<task>`
pub fn registry_name(task_name: &str) -> String {
    format!("{FOLDER}{task_name}")
}

impl NativeScheduler for SchtasksScheduler {
    fn name(&self) -> &'static str {
        "schtasks"
    }

    fn install(&self, task: &Task) -> Result<()> {
        // Translate first so an unsupported schedule leaves any existing entry alone.
        let trigger = schedule_args(&task.schedule)?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let name = registry_name(&task.name);
        if self.delete(&name)? {
            debug!(task = %task.name, "previous scheduled task removed");
        }

        let script = self.scripts.generate(task)?;
        let run = format!("\"{}\"", script.display());
        let mut args: Vec<&str> = vec!["/Create", "/TN", name.as_str(), "/TR", run.as_str()];
        args.extend(trigger.iter().map(String::as_str));

        let output = run_tool(TOOL, &args)?;
        check_status(TOOL, &output)?;
        info!(task = %task.name, schedule = %task.schedule, "scheduled task installed");
        Ok(())
    }

    fn remove(&self, task_name: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let removed = self.delete(&registry_name(task_name))?;
        if removed {
            info!(task = %task_name, "scheduled task removed");
        }
        Ok(removed)
    }

    fn query(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let output = run_tool(TOOL, &["/Query", "/FO", "CSV", "/NH"])?;
        check_status(TOOL, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| l.contains(FOLDER))
            .map(str::to_string)
            .collect())
    }

    fn scripts(&self) -> &ScriptGenerator {
        &self.scripts
    }
}

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Translate the common cron shapes into `schtasks /Create` trigger flags.
///
/// Anything else is [`CronError::UnsupportedSchedule`]; the string is not
/// otherwise validated.
pub fn schedule_args(schedule: &str) -> Result<Vec<String>> {
    let unsupported = || CronError::UnsupportedSchedule(schedule.to_string());
    let args = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let trimmed = schedule.trim();
    match trimmed {
        "@hourly" => return Ok(args(&["/SC", "HOURLY"])),
        "@daily" | "@midnight" => return Ok(args(&["/SC", "DAILY", "/ST", "00:00"])),
        "@weekly" => return Ok(args(&["/SC", "WEEKLY", "/D", "SUN", "/ST", "00:00"])),
        "@monthly" => return Ok(args(&["/SC", "MONTHLY", "/D", "1", "/ST", "00:00"])),
        "@reboot" => return Ok(args(&["/SC", "ONSTART"])),
        _ => {}
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let [minute, hour, dom, month, dow] = fields.as_slice() else {
        return Err(unsupported());
    };
    if *month != "*" {
        return Err(unsupported());
    }

    let num = |s: &str, max: u32| s.parse::<u32>().ok().filter(|n| *n <= max);

    match (*minute, *hour, *dom, *dow) {
        ("*", "*", "*", "*") => Ok(args(&["/SC", "MINUTE", "/MO", "1"])),
        (m, "*", "*", "*") if m.starts_with("*/") => {
            let every = num(&m[2..], 59).filter(|n| *n > 0).ok_or_else(unsupported)?;
            Ok(vec!["/SC".into(), "MINUTE".into(), "/MO".into(), every.to_string()])
        }
        (m, "*", "*", "*") => {
            let m = num(m, 59).ok_or_else(unsupported)?;
            Ok(vec!["/SC".into(), "HOURLY".into(), "/ST".into(), format!("00:{m:02}")])
        }
        (m, h, "*", "*") => {
            let start = start_time(m, h).ok_or_else(unsupported)?;
            Ok(vec!["/SC".into(), "DAILY".into(), "/ST".into(), start])
        }
        (m, h, "*", d) => {
            let start = start_time(m, h).ok_or_else(unsupported)?;
            let days = d
                .split(',')
                .map(|day| num(day, 7).map(|n| WEEKDAYS[(n % 7) as usize]))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unsupported)?;
            Ok(vec![
                "/SC".into(),
                "WEEKLY".into(),
                "/D".into(),
                days.join(","),
                "/ST".into(),
                start,
            ])
        }
        (m, h, day, "*") => {
            let start = start_time(m, h).ok_or_else(unsupported)?;
            let day = num(day, 31).filter(|n| *n > 0).ok_or_else(unsupported)?;
            Ok(vec![
                "/SC".into(),
                "MONTHLY".into(),
                "/D".into(),
                day.to_string(),
                "/ST".into(),
                start,
            ])
        }
        _ => Err(unsupported()),
    }
}

fn start_time(minute: &str, hour: &str) -> Option<String> {
    let m = minute.parse::<u32>().ok().filter(|m| *m <= 59)?;
    let h = hour.parse::<u32>().ok().filter(|h| *h <= 23)?;
    Some(format!("{h:02}:{m:02}"))
}
