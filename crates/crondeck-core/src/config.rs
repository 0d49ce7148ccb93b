use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Hard ceiling for a single on-demand run.
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 30_000;
/// History records kept per task (older rows are pruned on append).
pub const DEFAULT_HISTORY_RETENTION: usize = 30;

/// Top-level config (crondeck.toml + CRONDECK_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrondeckConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Filesystem roots. Log and script directories are derived from `base_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock limit for on-demand runs. Clamped to [`MAX_TIMEOUT_SECS`].
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Captured stdout/stderr beyond this size is middle-truncated.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    /// Reject commands matching the destructive-pattern denylist.
    #[serde(default = "bool_true")]
    pub enforce_safety: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: MAX_TIMEOUT_SECS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            enforce_safety: true,
        }
    }
}

impl ExecutionConfig {
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(1, MAX_TIMEOUT_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_retention")]
    pub retention: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    /// When true, deleting a task also drops its history rows and log directory.
    #[serde(default)]
    pub cascade_delete: bool,
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_timeout_secs() -> u64 {
    MAX_TIMEOUT_SECS
}
fn default_max_output_chars() -> usize {
    DEFAULT_MAX_OUTPUT_CHARS
}
fn default_retention() -> usize {
    DEFAULT_HISTORY_RETENTION
}
fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}
fn default_base_dir() -> String {
    format!("{}/.crondeck", home_dir())
}
fn default_db_path() -> String {
    format!("{}/.crondeck/crondeck.db", home_dir())
}

impl CrondeckConfig {
    /// Load config from a TOML file with CRONDECK_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.crondeck/crondeck.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CRONDECK_").split("_"))
            .extract()
            .map_err(|e| crate::error::CrondeckError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    format!("{}/.crondeck/crondeck.toml", home_dir())
}
