//! cutter-core: Core abstractions and configuration for cutter
//!
//! This crate provides the job and artifact types, the error taxonomy,
//! and the configuration structures shared by the dump engine and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use error::{BackupError, ConfigError};
pub use types::{Artifact, BackupJobSpec, BackupRequest, Engine, JumpHost};
