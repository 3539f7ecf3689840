//! Ephemeral loopback port allocation

use std::net::{Ipv4Addr, TcpListener};

use cutter_core::BackupError;

/// Ask the OS for a free loopback TCP port
///
/// The listener is dropped before returning, so the port is only known to be
/// free at the instant of allocation. Another process can claim it before the
/// tunnel binds; ssh then exits on forward failure and the readiness probe
/// reports it.
pub fn allocate_ephemeral_port() -> Result<u16, BackupError> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(BackupError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(BackupError::PortAllocation)?
        .port();
    tracing::trace!("Allocated ephemeral port {}", port);
    Ok(port)
}
