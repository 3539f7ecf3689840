//! Core domain types

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::BackupError;

/// Timestamp layout used in auto-generated artifact names
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// PostgreSQL, dumped with `pg_dump`
    Postgres,
    /// MySQL, dumped with `mysqldump`
    Mysql,
}

impl Engine {
    /// Lowercase name, as accepted by `--type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mysql => "mysql",
        }
    }

    /// Name of the vendor dump tool inside the engine's image
    pub fn dump_tool(&self) -> &'static str {
        match self {
            Engine::Postgres => "pg_dump",
            Engine::Mysql => "mysqldump",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Engine::Postgres),
            "mysql" => Ok(Engine::Mysql),
            other => Err(BackupError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// SSH jump host in `user@host[:port]` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpHost {
    /// Login user, if given
    pub user: Option<String>,
    /// Host name or address
    pub host: String,
    /// SSH port, if not the default
    pub port: Option<u16>,
}

impl JumpHost {
    /// Parse a jump host specification
    ///
    /// An empty specification is a configuration error: there is nothing to
    /// connect through.
    pub fn parse(spec: &str) -> Result<Self, BackupError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(BackupError::Configuration(
                "SSH jump host cannot be empty".to_string(),
            ));
        }

        let (user, rest) = match spec.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => {
                return Err(BackupError::Configuration(format!(
                    "SSH jump host '{}' has an empty user",
                    spec
                )))
            }
            None => (None, spec),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                    BackupError::Configuration(format!(
                        "SSH jump host '{}' has an invalid port '{}'",
                        spec, port
                    ))
                })?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err(BackupError::Configuration(format!(
                "SSH jump host '{}' has an empty host",
                spec
            )));
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }

    /// Destination argument for the ssh client (`user@host` or `host`)
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for JumpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination())?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Unvalidated backup request, as supplied by the command line
#[derive(Clone)]
pub struct BackupRequest {
    /// Engine name (`postgres`, `mysql`)
    pub engine: String,
    /// Database host as seen from the jump host (or from here, when direct)
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database user
    pub username: String,
    /// Database password (may be empty)
    pub password: String,
    /// Database to dump
    pub database: String,
    /// Artifact path; derived from the database name when absent
    pub output: Option<PathBuf>,
    /// Pipe the dump through the compressor
    pub compress: bool,
    /// SSH jump host (`user@host[:port]`)
    pub ssh_jump: Option<String>,
}

impl BackupRequest {
    /// Resolve defaults and validate the request
    ///
    /// Derives the output path first, then checks the engine. No external
    /// program is touched here.
    pub fn resolve<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Result<BackupJobSpec, BackupError>
    where
        Tz::Offset: fmt::Display,
    {
        let output = match self.output {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => default_output_path(&self.database, self.compress, now),
        };

        let engine = self.engine.parse::<Engine>()?;

        if self.database.is_empty() {
            return Err(BackupError::Configuration(
                "database name is required".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(BackupError::Configuration("username is required".to_string()));
        }

        let jump_host = match self.ssh_jump {
            Some(spec) if !spec.trim().is_empty() => Some(spec),
            _ => None,
        };

        Ok(BackupJobSpec {
            engine,
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            database: self.database,
            output,
            compress: self.compress,
            jump_host,
        })
    }
}

impl fmt::Debug for BackupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupRequest")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("output", &self.output)
            .field("compress", &self.compress)
            .field("ssh_jump", &self.ssh_jump)
            .finish()
    }
}

/// Validated, immutable description of one backup job
#[derive(Clone)]
pub struct BackupJobSpec {
    /// Database engine
    pub engine: Engine,
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database user
    pub username: String,
    /// Database password (may be empty)
    pub password: String,
    /// Database to dump
    pub database: String,
    /// Artifact path
    pub output: PathBuf,
    /// Pipe the dump through the compressor
    pub compress: bool,
    /// Raw jump host specification; parsed when the tunnel is opened
    pub jump_host: Option<String>,
}

impl fmt::Debug for BackupJobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupJobSpec")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("output", &self.output)
            .field("compress", &self.compress)
            .field("jump_host", &self.jump_host)
            .finish()
    }
}

/// Build `<database>_<YYYYMMDDHHMMSS>.sql[.gz]`
pub fn default_output_path<Tz: TimeZone>(database: &str, compress: bool, now: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: fmt::Display,
{
    let mut name = format!("{}_{}.sql", database, now.format(OUTPUT_TIMESTAMP_FORMAT));
    if compress {
        name.push_str(".gz");
    }
    PathBuf::from(name)
}

/// A dump file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Location of the file
    pub path: PathBuf,
    /// Size in bytes at inspection time
    pub size_bytes: u64,
}

impl Artifact {
    /// Stat a file and describe it as an artifact
    pub fn inspect(path: &Path) -> Result<Self, BackupError> {
        let metadata = std::fs::metadata(path).map_err(|e| BackupError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }
}
