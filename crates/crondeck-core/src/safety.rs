//! Denylist guard for task commands.
//!
//! Task commands run unattended from the native scheduler, so a handful of
//! patterns that can only do damage are rejected at save time. This is not a
//! sandbox; it catches the obvious footguns before they are installed.

/// Check whether `command` may be stored as a task command.
///
/// Returns `Ok(())` if allowed, or `Err(reason)` naming the matched pattern.
pub fn check_command(command: &str) -> Result<(), String> {
    let lower = command.trim().to_lowercase();

    for (pattern, reason) in DENYLIST {
        if lower.contains(pattern) {
            return Err(format!("{reason} (matched pattern: `{pattern}`)"));
        }
    }

    // `rm -rf /` must match the bare root only; `rm -rf /tmp/x` is fine.
    if lower
        .split(|c| c == ';' || c == '&' || c == '|')
        .any(|part| is_root_wipe(part.trim()))
    {
        return Err("Destructive: recursive forced removal of the root filesystem".to_string());
    }

    Ok(())
}

fn is_root_wipe(part: &str) -> bool {
    let tokens: Vec<&str> = part.split_whitespace().collect();
    matches!(tokens.as_slice(), ["rm", flags, target]
        if flags.starts_with('-') && flags.contains('r') && flags.contains('f')
            && (*target == "/" || *target == "/*"))
}

/// `(substring_pattern, human_readable_reason)` pairs, matched against the
/// lowercased, trimmed command. The first match wins.
const DENYLIST: &[(&str, &str)] = &[
    (":(){ :|:& };:", "Fork bomb: will exhaust system resources"),
    ("| sh", "Unsafe: piping content directly into sh"),
    ("| bash", "Unsafe: piping content directly into bash"),
    ("|sh", "Unsafe: piping content directly into sh (no space variant)"),
    ("|bash", "Unsafe: piping content directly into bash (no space variant)"),
    ("mkfs", "Destructive: creates a new filesystem, wiping existing data"),
    ("> /dev/sd", "Destructive: writes directly to a block device"),
    ("of=/dev/sd", "Destructive: raw disk write via dd"),
    ("chmod 777 / ", "Unsafe: world-writable permissions on root filesystem"),
    ("chown -r /", "Unsafe: recursive chown from root"),
    ("kill -9 -1", "Unsafe: sends SIGKILL to every process"),
    ("> /etc/", "Destructive: overwrites a file under /etc"),
    ("crontab -r", "Unsafe: wipes the whole crontab, including foreign entries"),
];
