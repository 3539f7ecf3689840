//! CLI command implementations

mod backup;
mod config;
mod list;

pub use backup::backup_command;
pub use config::{config_get, config_init, config_path, config_set, config_show};
pub use list::list_command;
