//! Dump pipeline composition
//!
//! Builds the container invocation for an engine's dump tool plus the
//! optional compressor stage. Everything is an argv list; no shell ever sees
//! these values, so credentials and identifiers need no quoting.

use std::fmt;

use cutter_core::config::BackupConfig;
use cutter_core::{BackupJobSpec, Engine};

/// Environment variable pg_dump reads the password from
const PG_PASSWORD_ENV: &str = "PGPASSWORD";

/// Placeholder for secrets in rendered commands
const REDACTED: &str = "****";

/// One program invocation
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Extra environment for this process
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Start a command for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Whether `arg` appears verbatim
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Whether `pair` appears as two consecutive arguments
    pub fn has_args(&self, pair: [&str; 2]) -> bool {
        self.args.windows(2).any(|w| w[0] == pair[0] && w[1] == pair[1])
    }

    fn render(&self, secrets: &[String]) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&redact(arg, secrets));
        }
        out
    }
}

// Environment values are never printed, only their names
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args.len())
            .field("env", &env)
            .finish()
    }
}

fn redact(arg: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(arg.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
}

/// Container network mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// Share the host network namespace and reach the database directly
    Host,
    /// Default bridge, with `alias` mapped to the host gateway
    Bridge {
        /// Hostname resolving to the host inside the container
        alias: String,
    },
}

/// How the container reaches the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Connect to the job's host and port
    Direct,
    /// Connect to the local end of an SSH forward
    Tunneled {
        /// Loopback port of the forward
        local_port: u16,
    },
}

/// Database connection parameters as the dump tool will see them
#[derive(Clone, Copy)]
pub struct ConnectionParams<'a> {
    /// Database host
    pub host: &'a str,
    /// Database port
    pub port: u16,
    /// Database user
    pub username: &'a str,
    /// Database password (may be empty)
    pub password: &'a str,
    /// Database name
    pub database: &'a str,
}

impl<'a> ConnectionParams<'a> {
    /// Borrow connection parameters from a job
    pub fn from_job(spec: &'a BackupJobSpec) -> Self {
        Self {
            host: &spec.host,
            port: spec.port,
            username: &spec.username,
            password: &spec.password,
            database: &spec.database,
        }
    }
}

/// A fully-formed dump pipeline
///
/// Stage 0 is the container run; when compression is on, the last stage is
/// the compressor reading the container's stdout.
#[derive(Debug, Clone)]
pub struct ComposedCommand {
    stages: Vec<CommandSpec>,
    network: NetworkMode,
    secrets: Vec<String>,
}

impl ComposedCommand {
    /// Assemble a pipeline by hand
    pub fn new(stages: Vec<CommandSpec>, network: NetworkMode) -> Self {
        Self {
            stages,
            network,
            secrets: Vec::new(),
        }
    }

    /// Values hidden when the pipeline is displayed
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// All stages, in pipe order
    pub fn stages(&self) -> &[CommandSpec] {
        &self.stages
    }

    /// The container invocation
    pub fn dump_stage(&self) -> Option<&CommandSpec> {
        self.stages.first()
    }

    /// The compressor, if the pipeline has one
    pub fn compressor_stage(&self) -> Option<&CommandSpec> {
        if self.stages.len() > 1 {
            self.stages.last()
        } else {
            None
        }
    }

    /// Container network mode
    pub fn network(&self) -> &NetworkMode {
        &self.network
    }
}

impl fmt::Display for ComposedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.stages.iter().map(|s| s.render(&self.secrets)).collect();
        f.write_str(&rendered.join(" | "))
    }
}

/// Builds dump pipelines from a [`BackupConfig`]
#[derive(Debug, Clone)]
pub struct CommandComposer {
    config: BackupConfig,
}

impl CommandComposer {
    /// Create a composer
    pub fn new(config: BackupConfig) -> Self {
        Self { config }
    }

    /// Image providing the engine's dump tool
    pub fn image(&self, engine: Engine) -> &str {
        match engine {
            Engine::Postgres => &self.config.postgres_image,
            Engine::Mysql => &self.config.mysql_image,
        }
    }

    /// Build the pipeline for one job
    ///
    /// Pure: no I/O, no state.
    pub fn compose(
        &self,
        engine: Engine,
        params: &ConnectionParams<'_>,
        compress: bool,
        topology: Topology,
    ) -> ComposedCommand {
        let (network, host, port) = match topology {
            Topology::Direct => (NetworkMode::Host, params.host.to_string(), params.port),
            Topology::Tunneled { local_port } => (
                NetworkMode::Bridge {
                    alias: self.config.host_gateway_alias.clone(),
                },
                self.config.host_gateway_alias.clone(),
                local_port,
            ),
        };

        let mut container = CommandSpec::new(&self.config.container_runtime).args(["run", "--rm"]);
        container = match &network {
            NetworkMode::Host => container.args(["--network", "host"]),
            NetworkMode::Bridge { alias } => {
                container.arg("--add-host").arg(format!("{}:host-gateway", alias))
            }
        };

        let has_password = !params.password.is_empty();
        let dump_args = match engine {
            Engine::Postgres => {
                if has_password {
                    // Name only: the runtime client copies the value from its own environment
                    container = container
                        .args(["-e", PG_PASSWORD_ENV])
                        .env(PG_PASSWORD_ENV, params.password);
                }
                vec![
                    "-h".to_string(),
                    host,
                    "-p".to_string(),
                    port.to_string(),
                    "-U".to_string(),
                    params.username.to_string(),
                    "--".to_string(),
                    params.database.to_string(),
                ]
            }
            Engine::Mysql => {
                let mut args = vec![
                    "-h".to_string(),
                    host,
                    "-P".to_string(),
                    port.to_string(),
                    "-u".to_string(),
                    params.username.to_string(),
                ];
                if has_password {
                    args.push(format!("-p{}", params.password));
                }
                // Database names starting with `-` must not parse as options
                args.push("--".to_string());
                args.push(params.database.to_string());
                args
            }
        };

        container = container
            .arg(self.image(engine))
            .arg(engine.dump_tool())
            .args(dump_args);

        let mut stages = vec![container];
        if compress {
            stages.push(CommandSpec::new(&self.config.compressor).arg("-c"));
        }

        ComposedCommand::new(stages, network).with_secret(params.password)
    }
}
