//! cutter CLI
//!
//! Self-service DevOps tasks from the terminal:
//! - Direct database backups to the local machine (`db backup`)
//! - Listing local dump files (`db list`)
//! - Managing the configuration file (`config ...`)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cutter::commands;
use cutter::output::print_error;
use cutter_core::BackupRequest;

#[derive(Parser)]
#[command(name = "cutter")]
#[command(author, version, about = "DevOps Cutter - Self-Service CLI for DevOps Tasks")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Direct database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Backup database directly to local machine
    #[command(after_help = BACKUP_EXAMPLES)]
    Backup(BackupArgs),

    /// List backup files in current directory
    List {
        /// Directory to scan
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

const BACKUP_EXAMPLES: &str = "Examples:
  # Direct PostgreSQL backup
  cutter db backup --type postgres --host localhost --port 5432 \\
    --username myuser --password mypass --database mydb

  # Backup via SSH jump host
  cutter db backup --type postgres --host 10.0.1.10 --port 5432 \\
    --username myuser --password mypass --database mydb \\
    --ssh-jump user@jumphost.com

  # Backup with custom output
  cutter db backup --type postgres --host localhost --database mydb \\
    --username myuser --output ~/backups/mydb.sql.gz";

#[derive(Args)]
struct BackupArgs {
    /// Database type (postgres, mysql)
    #[arg(long = "type", default_value = "postgres")]
    db_type: String,

    /// Database host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, default_value_t = 5432)]
    port: u16,

    /// Database username
    #[arg(long)]
    username: String,

    /// Database password
    #[arg(long, env = "CUTTER_DB_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Database name
    #[arg(long)]
    database: String,

    /// Output file path (default: auto-generated)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Compress with gzip
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    compress: bool,

    /// SSH jump host (user@host[:port])
    #[arg(long = "ssh-jump")]
    ssh_jump: Option<String>,

    /// Kill the dump after this many seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

impl BackupArgs {
    fn into_request(self) -> (BackupRequest, Option<Duration>) {
        let timeout = self.timeout.map(Duration::from_secs);
        let request = BackupRequest {
            engine: self.db_type,
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            database: self.database,
            output: self.output,
            compress: self.compress,
            ssh_jump: self.ssh_jump,
        };
        (request, timeout)
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Db { action } => match action {
            DbAction::Backup(args) => {
                let (request, timeout) = args.into_request();
                let cancel = CancellationToken::new();
                spawn_signal_handler(cancel.clone());
                commands::backup_command(config_path, request, timeout, cli.quiet, cancel).await?;
            }
            DbAction::List { dir } => {
                commands::list_command(&dir)?;
            }
        },

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Get { key } => commands::config_get(config_path, &key)?,
            ConfigAction::Set { key, value } => commands::config_set(config_path, &key, &value)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            ConfigAction::Path => commands::config_path(config_path),
        },
    }

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, cancelling backup...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, cancelling backup...");
            }
        }

        token.cancel();
    });
}
