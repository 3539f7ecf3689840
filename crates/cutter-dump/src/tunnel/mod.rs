//! SSH local-forward tunnel through a jump host
//!
//! The tunnel is an `ssh -N -L` subprocess owned by a [`TunnelHandle`].
//! Lifecycle is `Unopened -> Spawning -> Established -> Closed`, never
//! backwards. `Closed` is absorbing and closing twice is a no-op.

mod probe;

use std::process::Stdio;

use tokio::process::{Child, Command};

use cutter_core::config::TunnelConfig;
use cutter_core::{BackupError, JumpHost};

use crate::port::allocate_ephemeral_port;

pub use probe::wait_ready;

/// Tunnel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// No subprocess was ever started
    Unopened,
    /// ssh spawned, forward not yet confirmed
    Spawning,
    /// Forwarded port accepted a probe connection
    Established,
    /// Subprocess terminated; terminal state
    Closed,
}

/// An SSH local forward and the subprocess that owns it
///
/// Dropping an open handle kills the ssh process as a last resort, so a
/// panic between open and close does not leak the tunnel.
#[derive(Debug)]
pub struct TunnelHandle {
    local_port: u16,
    child: Option<Child>,
    state: TunnelState,
}

impl TunnelHandle {
    /// A handle with no subprocess behind it; closing it is a no-op
    pub fn unopened() -> Self {
        Self {
            local_port: 0,
            child: None,
            state: TunnelState::Unopened,
        }
    }

    fn spawning(local_port: u16, child: Child) -> Self {
        Self {
            local_port,
            child: Some(child),
            state: TunnelState::Spawning,
        }
    }

    /// Loopback port the forward listens on
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Current lifecycle state
    pub fn state(&self) -> TunnelState {
        self.state
    }

    /// OS process id of the ssh client, while it is owned
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Terminate the ssh subprocess and wait for it to exit
    ///
    /// Safe to call on a never-opened or already-closed handle.
    pub async fn close(&mut self) -> Result<(), BackupError> {
        let Some(mut child) = self.child.take() else {
            if self.state != TunnelState::Unopened {
                self.state = TunnelState::Closed;
            }
            return Ok(());
        };
        self.state = TunnelState::Closed;

        tracing::info!("Closing SSH tunnel on local port {}", self.local_port);

        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("SSH tunnel already exited with {}", status);
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                return Err(BackupError::Network(format!(
                    "failed to query SSH tunnel process: {}",
                    e
                )))
            }
        }

        child
            .kill()
            .await
            .map_err(|e| BackupError::Network(format!("failed to kill SSH tunnel: {}", e)))
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::warn!(
                    "Failed to kill SSH tunnel on port {} during drop: {}",
                    self.local_port,
                    e
                );
            }
        }
    }
}

/// Opens SSH tunnels according to [`TunnelConfig`]
#[derive(Debug, Clone)]
pub struct TunnelSupervisor {
    config: TunnelConfig,
}

impl TunnelSupervisor {
    /// Create a supervisor
    pub fn new(config: TunnelConfig) -> Self {
        Self { config }
    }

    /// Arguments for `ssh` forwarding `local_port` to `target_host:target_port`
    ///
    /// ssh stays our direct child (no `-f`) so the handle can terminate it.
    /// Host keys are not verified.
    pub fn ssh_args(
        jump: &JumpHost,
        local_port: u16,
        target_host: &str,
        target_port: u16,
    ) -> Vec<String> {
        let mut args = vec![
            "-N".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-L".to_string(),
            format!("{}:{}:{}", local_port, target_host, target_port),
        ];
        if let Some(port) = jump.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(jump.destination());
        args
    }

    /// Open a forward from a fresh loopback port to `target_host:target_port`
    ///
    /// An empty jump host fails before anything is spawned. The handle is
    /// returned only after the forwarded port accepts a connection.
    pub async fn open(
        &self,
        jump_host: &str,
        target_host: &str,
        target_port: u16,
    ) -> Result<TunnelHandle, BackupError> {
        let jump = JumpHost::parse(jump_host)?;
        let local_port = allocate_ephemeral_port()?;
        let args = Self::ssh_args(&jump, local_port, target_host, target_port);

        tracing::info!(
            "Creating SSH tunnel through {}: local port {} -> {}:{}",
            jump,
            local_port,
            target_host,
            target_port
        );
        tracing::debug!("{} {}", self.config.ssh_program, args.join(" "));

        let mut child = Command::new(&self.config.ssh_program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackupError::Network(format!(
                    "failed to start {}: {}",
                    self.config.ssh_program, e
                ))
            })?;

        let ready = wait_ready(
            &mut child,
            local_port,
            self.config.ready_timeout,
            self.config.probe_interval,
        )
        .await;

        let mut handle = TunnelHandle::spawning(local_port, child);

        if let Err(e) = ready {
            if let Err(close_err) = handle.close().await {
                tracing::warn!("Failed to close SSH tunnel: {}", close_err);
            }
            return Err(e);
        }

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        handle.state = TunnelState::Established;
        tracing::info!("SSH tunnel established on local port {}", local_port);
        Ok(handle)
    }
}
