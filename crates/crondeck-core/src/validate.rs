//! Input validation, applied before anything is persisted.
//!
//! Command policy: every command is handed to the platform shell (`sh -c` /
//! `cmd /C`) both by the wrapper script and by on-demand runs, so metacharacters
//! behave the same on both paths. What must never reach the crontab or the
//! wrapper is a line break, which would smuggle in an extra entry or statement.
//! Schedules are spliced into the crontab line unquoted, so they are held to the
//! cron field alphabet.

use crate::error::{CrondeckError, Result};
use crate::safety;
use crate::types::TaskDefinition;

pub const MAX_NAME_LEN: usize = 64;

/// Minute, hour, day of month, month, day of week.
const CRON_FIELDS: usize = 5;

/// Task names become directory names, file stems and crontab tag tokens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid("name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if name.starts_with('.') {
        return Err(invalid("name must not start with '.'"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(format!(
            "name contains invalid character {bad:?} (allowed: A-Z a-z 0-9 - _ .)"
        )));
    }
    Ok(())
}

/// A schedule is either an `@keyword` (`@daily`, `@reboot`, ...) or five
/// fields built from digits, letters and `* / , -`.
///
/// Whether the values are in range is left to the native scheduler.
pub fn validate_schedule(schedule: &str) -> Result<()> {
    single_line("schedule", schedule, true)?;
    let schedule = schedule.trim();

    if let Some(keyword) = schedule.strip_prefix('@') {
        if !keyword.is_empty() && keyword.chars().all(|c| c.is_ascii_lowercase()) {
            return Ok(());
        }
        return Err(invalid(format!("schedule {schedule:?} is not a valid @keyword")));
    }

    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != CRON_FIELDS {
        return Err(invalid(format!(
            "schedule must have {CRON_FIELDS} fields or be an @keyword, got {}",
            fields.len()
        )));
    }
    for field in fields {
        if let Some(bad) = field
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-')))
        {
            return Err(invalid(format!(
                "schedule field {field:?} contains invalid character {bad:?}"
            )));
        }
    }
    Ok(())
}

/// Validate a full definition. `enforce_safety` toggles the command denylist.
pub fn validate_definition(def: &TaskDefinition, enforce_safety: bool) -> Result<()> {
    validate_name(&def.name)?;
    validate_schedule(&def.schedule)?;
    single_line("command", &def.command, true)?;
    single_line("description", &def.description, false)?;
    if let Some(dir) = def.working_dir.as_deref() {
        single_line("working_dir", dir, false)?;
    }
    if enforce_safety {
        safety::check_command(&def.command).map_err(|reason| invalid(format!("command rejected: {reason}")))?;
    }
    Ok(())
}

fn single_line(field: &str, value: &str, required: bool) -> Result<()> {
    if required && value.trim().is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    if value.contains(['\n', '\r', '\0']) {
        return Err(invalid(format!(
            "{field} must be a single line without control characters"
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> CrondeckError {
    CrondeckError::Validation(msg.into())
}
