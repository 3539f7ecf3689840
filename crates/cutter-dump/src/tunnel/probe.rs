//! Readiness probe for a freshly spawned forward

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::time::Instant;

use cutter_core::BackupError;

/// Upper bound for a single connect attempt
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// Wait until `127.0.0.1:port` accepts a TCP connection
///
/// Fails fast if `child` exits first (ssh gives up on auth or on forward
/// failure), and with `Network` once `timeout` has elapsed.
pub async fn wait_ready(
    child: &mut Child,
    port: u16,
    timeout: Duration,
    interval: Duration,
) -> Result<(), BackupError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        if let Some(status) = child
            .try_wait()
            .map_err(|e| BackupError::Network(format!("failed to query ssh process: {}", e)))?
        {
            return Err(BackupError::Network(format!(
                "ssh exited with {} before the tunnel on port {} was ready",
                status, port
            )));
        }

        let attempt = CONNECT_ATTEMPT_TIMEOUT.min(timeout.max(Duration::from_millis(1)));
        if let Ok(Ok(stream)) = tokio::time::timeout(attempt, TcpStream::connect(addr)).await {
            drop(stream);
            tracing::debug!("Tunnel port {} ready after {} probe(s)", port, attempts);
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(BackupError::Network(format!(
                "tunnel on port {} not ready after {:?} ({} probes)",
                port, timeout, attempts
            )));
        }

        tokio::time::sleep(interval).await;
    }
}
