//! cutter-cli: Command-line interface for cutter
//!
//! Provides the `cutter` CLI for direct database backups and for managing
//! the local configuration file.

pub mod commands;
pub mod output;
