//! Backup orchestration
//!
//! One invocation runs strictly in order: resolve defaults, validate the
//! engine, check the container runtime, open the tunnel (if any), compose,
//! execute, inspect the artifact. The tunnel is closed on every path out.

use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use cutter_core::config::{BackupConfig, ConfigFile, TunnelConfig};
use cutter_core::{Artifact, BackupError, BackupJobSpec, BackupRequest};

use crate::compose::{CommandComposer, ConnectionParams, Topology};
use crate::executor::DumpExecutor;
use crate::tunnel::{TunnelHandle, TunnelSupervisor};

/// Check that `program` can be found on PATH (or exists, if a path)
pub fn ensure_installed(program: &str) -> Result<(), BackupError> {
    which::which(program)
        .map(|path| tracing::debug!("Found {} at {:?}", program, path))
        .map_err(|_| BackupError::DependencyMissing {
            program: program.to_string(),
        })
}

/// Drives one backup from request to artifact
#[derive(Debug, Clone)]
pub struct BackupRunner {
    backup: BackupConfig,
    tunnel: TunnelConfig,
    quiet: bool,
}

impl BackupRunner {
    /// Create a runner from its two config sections
    pub fn new(backup: BackupConfig, tunnel: TunnelConfig) -> Self {
        Self {
            backup,
            tunnel,
            quiet: false,
        }
    }

    /// Create a runner from a loaded config file
    pub fn from_config(config: &ConfigFile) -> Self {
        Self::new(config.backup.clone(), config.tunnel.clone())
    }

    /// Override the dump deadline from the config
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.backup.dump_timeout = timeout;
        }
        self
    }

    /// Do not echo dump diagnostics to the console
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Resolve a raw request and run it
    pub async fn run(
        &self,
        request: BackupRequest,
        cancel: &CancellationToken,
    ) -> Result<Artifact, BackupError> {
        let spec = request.resolve(&Local::now())?;
        self.run_job(&spec, cancel).await
    }

    /// Run an already-validated job
    pub async fn run_job(
        &self,
        spec: &BackupJobSpec,
        cancel: &CancellationToken,
    ) -> Result<Artifact, BackupError> {
        tracing::info!(
            "Starting backup for {} database {} on {}:{} -> {:?}",
            spec.engine,
            spec.database,
            spec.host,
            spec.port,
            spec.output
        );

        ensure_installed(&self.backup.container_runtime)?;
        if spec.compress {
            ensure_installed(&self.backup.compressor)?;
        }

        let mut tunnel = match spec.jump_host.as_deref() {
            Some(jump) => {
                let supervisor = TunnelSupervisor::new(self.tunnel.clone());
                tokio::select! {
                    opened = supervisor.open(jump, &spec.host, spec.port) => Some(opened?),
                    _ = cancel.cancelled() => return Err(BackupError::Cancelled),
                }
            }
            None => None,
        };

        let result = self.dump(spec, tunnel.as_ref(), cancel).await;

        if let Some(handle) = tunnel.as_mut() {
            if let Err(e) = handle.close().await {
                tracing::warn!("Failed to close SSH tunnel: {}", e);
            }
        }

        result
    }

    async fn dump(
        &self,
        spec: &BackupJobSpec,
        tunnel: Option<&TunnelHandle>,
        cancel: &CancellationToken,
    ) -> Result<Artifact, BackupError> {
        let topology = match tunnel {
            Some(handle) => Topology::Tunneled {
                local_port: handle.local_port(),
            },
            None => Topology::Direct,
        };

        let command = CommandComposer::new(self.backup.clone()).compose(
            spec.engine,
            &ConnectionParams::from_job(spec),
            spec.compress,
            topology,
        );

        let result = DumpExecutor::new()
            .with_timeout(self.backup.dump_timeout)
            .quiet(self.quiet)
            .run(&command, &spec.output, cancel)
            .await?;

        let artifact = Artifact::inspect(&result.output)?;
        tracing::info!(
            "Backup written to {:?} ({} bytes) in {:.1}s",
            artifact.path,
            artifact.size_bytes,
            result.elapsed.as_secs_f64()
        );
        Ok(artifact)
    }
}
