//! testflow - natural-language browser-automation runner.
//!
//! Main entry point for the testflow server CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use testflow_api::{ApiServer, AppState, ServerConfig};
use testflow_automation::report::rebrand_reports;
use testflow_core::{Config, ConfigLoader};
use testflow_store::ExecutionStore;

/// testflow CLI.
#[derive(Parser)]
#[command(name = "testflow")]
#[command(about = "Natural-language browser-automation runner")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in foreground (default)
    Run {
        /// Server host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Rewrite vendor branding in stored HTML reports
    Rebrand {
        /// Directory to scan (default: configured artifacts directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Base directory for testflow state (~/.testflow).
fn testflow_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".testflow")
}

/// Initialize tracing with console and rolling file output.
///
/// Log files go to ~/.testflow/logs/ with daily rotation.
fn init_tracing() -> anyhow::Result<()> {
    let log_dir = testflow_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("testflow")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the life of the process
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        None => run_server(config, None, None).await,
        Some(Commands::Run { host, port }) => run_server(config, host, port).await,
        Some(Commands::Rebrand { dir }) => rebrand(config, dir),
    }
}

/// Run the server in foreground.
async fn run_server(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!("Starting testflow v{}", env!("CARGO_PKG_VERSION"));

    let db_path = ConfigLoader::expand_path(&config.database.path);
    let store = ExecutionStore::open(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path))?;
    info!("Database ready at {}", db_path);

    let artifacts_dir = config.artifacts.dir_path();
    std::fs::create_dir_all(&artifacts_dir)
        .with_context(|| format!("failed to create artifacts dir {}", artifacts_dir.display()))?;
    info!("Artifacts directory: {}", artifacts_dir.display());

    let server_config = ServerConfig::new(config.server.host.clone(), config.server.port);
    let state = Arc::new(AppState::new(store, config));
    let server = ApiServer::new(server_config, state);

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))
}

/// Rebrand stored reports: scan each execution's artifact directory.
fn rebrand(config: Config, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let root = dir.unwrap_or_else(|| config.artifacts.dir_path());
    let mut total = 0;

    total += rebrand_reports(&root).unwrap_or(0);
    for entry in std::fs::read_dir(&root)
        .with_context(|| format!("failed to read {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            total += rebrand_reports(&entry.path()).unwrap_or(0);
        }
    }

    println!("rebranded {} report(s) under {}", total, root.display());
    Ok(())
}
