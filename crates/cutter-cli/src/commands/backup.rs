//! Backup command implementation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::output::{format_size, print_info, print_success};
use cutter_core::config::ConfigFile;
use cutter_core::BackupRequest;
use cutter_dump::BackupRunner;

/// Execute `db backup`
pub async fn backup_command(
    config_path: Option<&Path>,
    request: BackupRequest,
    timeout: Option<Duration>,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let config = ConfigFile::load_or_default(config_path).context("Failed to load configuration")?;
    let spec = request.resolve(&Local::now())?;

    if !quiet {
        print_info(&format!(
            "Starting backup for {} database: {}",
            spec.engine, spec.database
        ));
        print_info(&format!("Host: {}:{}", spec.host, spec.port));
        if let Some(jump) = &spec.jump_host {
            print_info(&format!("Via SSH jump host: {}", jump));
        }
        print_info(&format!("Output: {}", spec.output.display()));
    }

    let artifact = BackupRunner::from_config(&config)
        .with_timeout(timeout)
        .quiet(quiet)
        .run_job(&spec, &cancel)
        .await?;

    print_success("Backup completed successfully!");
    println!("  File: {}", artifact.path.display());
    println!("  Size: {}", format_size(artifact.size_bytes));

    Ok(())
}
