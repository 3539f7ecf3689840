//! Backup execution configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::option_duration_secs;

/// Settings for composing and running dump pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Container runtime CLI (name on PATH or absolute path)
    pub container_runtime: String,

    /// Compressor program; invoked as `<compressor> -c`
    pub compressor: String,

    /// Image providing `pg_dump`
    pub postgres_image: String,

    /// Image providing `mysqldump`
    pub mysql_image: String,

    /// Hostname that resolves to the host's loopback inside a bridged container
    pub host_gateway_alias: String,

    /// Deadline for a single dump, in seconds. Unset means no deadline.
    #[serde(
        default,
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub dump_timeout: Option<Duration>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            container_runtime: "docker".to_string(),
            compressor: "gzip".to_string(),
            postgres_image: "postgres:15-alpine".to_string(),
            mysql_image: "mysql:8".to_string(),
            host_gateway_alias: "host.docker.internal".to_string(),
            dump_timeout: None,
        }
    }
}
