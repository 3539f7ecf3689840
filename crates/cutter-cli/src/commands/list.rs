//! List command implementation

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::format_backups;
use cutter_dump::catalog::list_backups;

/// Execute `db list`
pub fn list_command(dir: &Path) -> Result<()> {
    let backups =
        list_backups(dir).with_context(|| format!("Failed to list backups in {:?}", dir))?;

    if backups.is_empty() {
        println!("No backup files found in {}", dir.display());
        return Ok(());
    }

    println!("Backup files:");
    println!("{}", format_backups(&backups));
    Ok(())
}
