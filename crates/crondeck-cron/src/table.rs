//! Line-level editing of a crontab.
//!
//! A managed entry is a tag comment immediately followed by its invocation:
//!
//! ```text
//! # crondeck: nightly-backup - archive /data
//! 0 2 * * * '/home/me/.crondeck/scripts/nightly-backup.sh'
//! ```
//!
//! Every other line is foreign and is carried through byte-for-byte, in its
//! original position. Nothing here touches the filesystem or the crontab tool.

use std::path::Path;

use crondeck_core::types::Task;

use crate::script::sh_quote;

/// Reserved comment prefix identifying entries owned by crondeck.
pub const MARKER: &str = "# crondeck:";

/// Split raw crontab content into lines.
///
/// Only `\n` separates lines, so a stray `\r` stays part of its line and is
/// written back unchanged. A single trailing newline is not a line.
pub fn parse(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    content
        .strip_suffix('\n')
        .unwrap_or(content)
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Inverse of [`parse`]; non-empty tables always end with a newline.
pub fn render(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// The task name a tag line refers to, or `None` for any other line.
pub fn tagged_name(line: &str) -> Option<&str> {
    let rest = line.trim_end_matches('\r').strip_prefix(MARKER)?;
    if !rest.starts_with(' ') {
        return None;
    }
    rest.split_whitespace().next()
}

/// `# crondeck: <name> - <description>`
pub fn tag_line(task: &Task) -> String {
    format!("{MARKER} {} - {}", task.name, task.description)
}

/// `<schedule> '<script>'`
pub fn invocation_line(task: &Task, script: &Path) -> String {
    format!(
        "{} {}",
        task.schedule.trim(),
        sh_quote(&script.to_string_lossy())
    )
}

/// Copy of `lines` without any entry tagged for `task_name`.
///
/// The line after a matching tag is dropped with it unless that line is blank,
/// a comment, or another tag; those were never ours.
pub fn strip_entry(lines: &[String], task_name: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if tagged_name(&lines[i]) == Some(task_name) {
            if let Some(next) = lines.get(i + 1) {
                if is_invocation(next) {
                    i += 1;
                }
            }
        } else {
            out.push(lines[i].clone());
        }
        i += 1;
    }
    out
}

/// Append a fresh tag + invocation pair for `task`.
pub fn append_entry(lines: &mut Vec<String>, task: &Task, script: &Path) {
    lines.push(tag_line(task));
    lines.push(invocation_line(task, script));
}

/// Names of all managed entries, in table order.
pub fn managed_names(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| tagged_name(l))
        .map(str::to_string)
        .collect()
}

fn is_invocation(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}
