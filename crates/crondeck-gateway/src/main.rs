use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crondeck_core::{config::CrondeckConfig, layout::Layout};
use crondeck_store::{HistoryStore, TaskStore};
use serde::Serialize;
use tracing::info;

mod app;
mod http;
mod service;

use service::TaskService;

#[derive(Debug, Parser)]
#[command(name = "crondeck", version, about = "Manage scheduled shell tasks")]
struct Cli {
    /// Path to crondeck.toml (defaults to $CRONDECK_CONFIG, then ~/.crondeck/crondeck.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP gateway (default)
    Serve,
    /// Print all tasks as JSON
    List,
    /// Run a task now and print the result; exits 1 if the run failed
    Run { name: String },
    /// Print recent execution records for a task
    History {
        name: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the newest log file of a task
    Log { name: String },
    /// Reinstall every stored task into the native scheduler
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "crondeck_gateway=info,crondeck_cron=info,tower_http=debug".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // load config: --config > CRONDECK_CONFIG env > ~/.crondeck/crondeck.toml
    let config_path = cli.config.or_else(|| std::env::var("CRONDECK_CONFIG").ok());
    let config = CrondeckConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        CrondeckConfig::default()
    });

    let service = build_service(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, service).await?,
        Command::List => print_json(&service.list_tasks()?)?,
        Command::Run { name } => {
            let result = service.run_task(&name).await?;
            print_json(&result)?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::History { name, limit } => {
            let limit = limit.unwrap_or_else(|| service.default_history_limit());
            print_json(&service.get_history(&name, limit)?)?;
        }
        Command::Log { name } => print_json(&service.get_log(&name).await?)?,
        Command::Sync => print_json(&service.resync()?)?,
    }
    Ok(())
}

/// Open the database, run migrations and pick the native scheduler.
fn build_service(config: &CrondeckConfig) -> anyhow::Result<TaskService> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    std::fs::create_dir_all(&config.paths.base_dir)?;
    info!(path = %db_path, "opening SQLite database");

    // each store gets its own connection; WAL lets them coexist
    let tasks = TaskStore::new(open_db(db_path)?)?;
    let history = HistoryStore::new(open_db(db_path)?, config.history.retention)?;
    info!("database migrations complete");

    let scheduler = crondeck_cron::detect(&Layout::new(&config.paths.base_dir));
    Ok(TaskService::new(config, tasks, Arc::new(history), scheduler))
}

fn open_db(path: &str) -> anyhow::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

async fn serve(config: CrondeckConfig, service: TaskService) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, service));
    let router = app::build_router(state);

    info!("crondeck gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
