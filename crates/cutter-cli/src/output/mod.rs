//! Output formatting utilities for the CLI
//!
//! Tables for backup listings, human-readable sizes, and the coloured status
//! lines printed around a backup run.

use std::path::Path;

use tabled::{settings::Style, Table, Tabled};

use cutter_core::Artifact;

/// Format a list of backup files as an ASCII table
///
/// # Returns
/// A formatted string suitable for terminal output, or "No backup files found"
/// if the list is empty.
pub fn format_backups(backups: &[Artifact]) -> String {
    if backups.is_empty() {
        return "No backup files found".to_string();
    }

    #[derive(Tabled)]
    struct BackupRow {
        #[tabled(rename = "FILE")]
        file: String,
        #[tabled(rename = "SIZE")]
        size: String,
    }

    let rows: Vec<BackupRow> = backups
        .iter()
        .map(|b| BackupRow {
            file: display_name(&b.path),
            size: format_size(b.size_bytes),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a byte count in megabytes with two decimals
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print a success message in green with a checkmark prefix
///
/// Outputs to stdout with green coloring for positive feedback to the user.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
