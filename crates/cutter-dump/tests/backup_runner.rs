//! Backup runner integration tests
//!
//! Drives `BackupRunner` end to end with a stand-in container runtime: a
//! shell script that prints its arguments the way `docker run` would print a
//! dump.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use cutter_core::config::{BackupConfig, TunnelConfig};
use cutter_core::{BackupError, BackupRequest};
use cutter_dump::BackupRunner;

const FAKE_RUNTIME: &str = r#"#!/bin/sh
echo "-- fake dump"
for arg in "$@"; do
  echo "arg:$arg"
done
echo "env:PGPASSWORD=${PGPASSWORD:-}"
"#;

const FAILING_RUNTIME: &str = r#"#!/bin/sh
echo "-- partial"
echo "pg_dump: error: connection to server failed" >&2
exit 1
"#;

/// Stand-in ssh that records its `-L` spec and pid, then idles like `ssh -N`
///
/// It does not listen itself; [`serve_forward`] plays the forwarded port.
fn fake_ssh(dir: &Path) -> PathBuf {
    let body = format!(
        r#"#!/bin/sh
prev=""
for arg in "$@"; do
  if [ "$prev" = "-L" ]; then
    echo "$arg" > "{dir}/forward.tmp"
    mv "{dir}/forward.tmp" "{dir}/forward"
  fi
  prev="$arg"
done
echo $$ > "{dir}/ssh.pid"
exec sleep 30
"#,
        dir = dir.display()
    );
    write_script(dir, "fake-ssh", &body)
}

/// Accept connections on the local port the fake ssh was asked to forward
fn serve_forward(dir: &Path) -> tokio::task::JoinHandle<()> {
    let forward = dir.join("forward");
    tokio::spawn(async move {
        let spec = loop {
            if let Ok(spec) = tokio::fs::read_to_string(&forward).await {
                break spec;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        let port: u16 = spec.split(':').next().unwrap().parse().unwrap();
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .unwrap();
        loop {
            let _ = listener.accept().await;
        }
    })
}

fn forwarded_port(dir: &Path) -> String {
    let spec = std::fs::read_to_string(dir.join("forward")).unwrap();
    let parts: Vec<&str> = spec.trim().split(':').collect();
    assert_eq!(&parts[1..], &["10.0.1.10", "5432"]);
    parts[0].to_string()
}

fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn tunneled_request(output: &Path) -> BackupRequest {
    let mut req = request(output, false);
    req.host = "10.0.1.10".to_string();
    req.ssh_jump = Some("user@jump".to_string());
    req
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn runner(runtime: &str) -> BackupRunner {
    runner_with_ssh(runtime, "false")
}

fn runner_with_ssh(runtime: &str, ssh: &str) -> BackupRunner {
    let backup = BackupConfig {
        container_runtime: runtime.to_string(),
        ..BackupConfig::default()
    };
    let tunnel = TunnelConfig {
        ssh_program: ssh.to_string(),
        ready_timeout: Duration::from_secs(2),
        probe_interval: Duration::from_millis(20),
        settle_delay: Duration::ZERO,
    };
    BackupRunner::new(backup, tunnel).quiet(true)
}

fn request(output: &Path, compress: bool) -> BackupRequest {
    BackupRequest {
        engine: "postgres".to_string(),
        host: "localhost".to_string(),
        port: 5432,
        username: "myuser".to_string(),
        password: "mypass".to_string(),
        database: "mydb".to_string(),
        output: Some(output.to_path_buf()),
        compress,
        ssh_jump: None,
    }
}

#[tokio::test]
async fn test_direct_postgres_backup() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);
    let output = dir.path().join("mydb.sql");

    let artifact = runner(runtime.to_str().unwrap())
        .run(request(&output, false), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(artifact.path, output);
    assert_eq!(
        artifact.size_bytes,
        std::fs::metadata(&output).unwrap().len()
    );

    let content = std::fs::read_to_string(&output).unwrap();
    let args: Vec<&str> = content
        .lines()
        .filter_map(|l| l.strip_prefix("arg:"))
        .collect();
    assert_eq!(
        args,
        vec![
            "run",
            "--rm",
            "--network",
            "host",
            "-e",
            "PGPASSWORD",
            "postgres:15-alpine",
            "pg_dump",
            "-h",
            "localhost",
            "-p",
            "5432",
            "-U",
            "myuser",
            "--",
            "mydb",
        ]
    );
    assert!(content.contains("env:PGPASSWORD=mypass"));
}

#[tokio::test]
async fn test_compressed_backup_is_gzip() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);
    let output = dir.path().join("mydb.sql.gz");

    let artifact = runner(runtime.to_str().unwrap())
        .run(request(&output, true), &CancellationToken::new())
        .await
        .unwrap();

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    assert_eq!(artifact.size_bytes, bytes.len() as u64);
}

#[tokio::test]
async fn test_mysql_password_on_command_line() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);
    let output = dir.path().join("shop.sql");

    let mut req = request(&output, false);
    req.engine = "mysql".to_string();
    req.port = 3306;

    runner(runtime.to_str().unwrap())
        .run(req, &CancellationToken::new())
        .await
        .unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.contains("arg:mysql:8"));
    assert!(content.contains("arg:mysqldump"));
    assert!(content.contains("arg:-pmypass"));
    assert!(!content.contains("arg:PGPASSWORD"));
}

#[tokio::test]
async fn test_unsupported_engine_checked_first() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("mydb.sql");

    let mut req = request(&output, false);
    req.engine = "oracle".to_string();
    req.ssh_jump = Some("user@jump".to_string());

    // The runtime is missing too; the engine must be rejected before that is noticed
    let err = runner("cutter-no-such-runtime")
        .run(req, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::UnsupportedEngine(ref e) if e == "oracle"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_runtime_creates_no_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("mydb.sql");

    let mut req = request(&output, false);
    req.ssh_jump = Some("user@jump".to_string());

    let err = runner("cutter-no-such-runtime")
        .run(req, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, BackupError::DependencyMissing { ref program } if program == "cutter-no-such-runtime")
    );
    assert!(!output.exists());
}

#[tokio::test]
async fn test_failed_dump_keeps_partial_file() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "failing-docker", FAILING_RUNTIME);
    let output = dir.path().join("mydb.sql");

    let err = runner(runtime.to_str().unwrap())
        .run(request(&output, false), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        BackupError::Execution { diagnostics, .. } => {
            assert!(diagnostics.contains("connection to server failed"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "-- partial\n");
}

#[tokio::test]
async fn test_tunnel_failure_stops_before_dump() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);
    let output = dir.path().join("mydb.sql");

    let mut req = request(&output, false);
    req.host = "10.0.1.10".to_string();
    req.ssh_jump = Some("user@jump".to_string());

    // ssh_program is `false`, which exits as soon as it starts
    let err = runner(runtime.to_str().unwrap())
        .run(req, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::Network(_)), "got {:?}", err);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_derived_output_name() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);

    let mut req = request(Path::new(""), true);
    req.output = None;
    // Database name doubles as a directory prefix so the file lands in the temp dir
    req.database = dir.path().join("mydb").to_string_lossy().into_owned();

    let artifact = runner(runtime.to_str().unwrap())
        .run(req, &CancellationToken::new())
        .await
        .unwrap();

    let name = artifact.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("mydb_"), "{}", name);
    assert!(name.ends_with(".sql.gz"), "{}", name);
    // mydb_ + 14 digit timestamp + .sql.gz
    assert_eq!(name.len(), "mydb_".len() + 14 + ".sql.gz".len());
    assert!(artifact.path.exists());
}

#[tokio::test]
async fn test_tunneled_backup_targets_forwarded_port() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "fake-docker", FAKE_RUNTIME);
    let ssh = fake_ssh(dir.path());
    let output = dir.path().join("mydb.sql");
    let server = serve_forward(dir.path());

    let artifact = runner_with_ssh(runtime.to_str().unwrap(), ssh.to_str().unwrap())
        .run(tunneled_request(&output), &CancellationToken::new())
        .await
        .unwrap();
    server.abort();

    assert_eq!(artifact.size_bytes, std::fs::metadata(&output).unwrap().len());

    let local_port = forwarded_port(dir.path());
    let content = std::fs::read_to_string(&output).unwrap();
    let args: Vec<&str> = content
        .lines()
        .filter_map(|l| l.strip_prefix("arg:"))
        .collect();
    assert_eq!(
        args,
        vec![
            "run",
            "--rm",
            "--add-host",
            "host.docker.internal:host-gateway",
            "-e",
            "PGPASSWORD",
            "postgres:15-alpine",
            "pg_dump",
            "-h",
            "host.docker.internal",
            "-p",
            local_port.as_str(),
            "-U",
            "myuser",
            "--",
            "mydb",
        ]
    );

    let pid = std::fs::read_to_string(dir.path().join("ssh.pid")).unwrap();
    assert!(!process_alive(pid.trim()), "ssh {} still running", pid.trim());
}

#[tokio::test]
async fn test_tunnel_closed_after_failed_dump() {
    let dir = TempDir::new().unwrap();
    let runtime = write_script(dir.path(), "failing-docker", FAILING_RUNTIME);
    let ssh = fake_ssh(dir.path());
    let output = dir.path().join("mydb.sql");
    let server = serve_forward(dir.path());

    let err = runner_with_ssh(runtime.to_str().unwrap(), ssh.to_str().unwrap())
        .run(tunneled_request(&output), &CancellationToken::new())
        .await
        .unwrap_err();
    server.abort();

    assert!(matches!(err, BackupError::Execution { .. }), "got {:?}", err);
    forwarded_port(dir.path());

    let pid = std::fs::read_to_string(dir.path().join("ssh.pid")).unwrap();
    assert!(!process_alive(pid.trim()), "ssh {} still running", pid.trim());
}
