//! Dump pipeline execution
//!
//! Spawns every stage of a [`ComposedCommand`], wires stdout to the next
//! stage's stdin, and sends the last stage's stdout into the artifact file.
//! Each stage's stderr is echoed to the console and kept for the error
//! report.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cutter_core::BackupError;

use crate::compose::ComposedCommand;

/// Cap on captured diagnostics per stage
const MAX_CAPTURED_DIAGNOSTICS: usize = 64 * 1024;

/// How long stderr readers may keep draining once the stages are done
///
/// A descendant of a killed stage can hold the pipe open for as long as it
/// lives; reading stops after this grace period.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Outcome of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// File the pipeline wrote
    pub output: PathBuf,
    /// Wall-clock run time
    pub elapsed: Duration,
}

/// Runs composed pipelines
#[derive(Debug, Clone, Default)]
pub struct DumpExecutor {
    timeout: Option<Duration>,
    quiet: bool,
}

struct Stage {
    program: String,
    child: Child,
    stderr: JoinHandle<String>,
}

enum Outcome {
    Finished(Result<Option<(String, ExitStatus)>, BackupError>),
    TimedOut(Duration),
    Cancelled,
}

impl DumpExecutor {
    /// Executor with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the pipeline if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Capture stderr without echoing it to the console
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run `command`, writing its output to `output`
    ///
    /// `output` is created (or truncated) before anything is spawned, so a
    /// failed run can leave an empty or partial file behind. It is not
    /// removed.
    pub async fn run(
        &self,
        command: &ComposedCommand,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, BackupError> {
        let started = Instant::now();

        if command.stages().is_empty() {
            return Err(BackupError::Configuration(
                "nothing to execute: empty pipeline".to_string(),
            ));
        }

        tracing::info!("Running dump: {}", command);

        let file = std::fs::File::create(output).map_err(|e| BackupError::io(output, e))?;
        let drain_stop = CancellationToken::new();
        let mut stages = self.spawn_pipeline(command, file, output, &drain_stop)?;

        let outcome = {
            let deadline = async {
                match self.timeout {
                    Some(limit) => {
                        tokio::time::sleep(limit).await;
                        limit
                    }
                    None => std::future::pending::<Duration>().await,
                }
            };

            tokio::select! {
                result = wait_all(&mut stages) => Outcome::Finished(result),
                limit = deadline => Outcome::TimedOut(limit),
                _ = cancel.cancelled() => Outcome::Cancelled,
            }
        };

        if !matches!(outcome, Outcome::Finished(_)) {
            kill_all(&mut stages).await;
        }

        let grace = {
            let stop = drain_stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(STDERR_DRAIN_GRACE).await;
                stop.cancel();
            })
        };

        let mut diagnostics = String::new();
        for stage in stages {
            match stage.stderr.await {
                Ok(captured) => diagnostics.push_str(&captured),
                Err(e) => tracing::debug!("stderr reader for {} failed: {}", stage.program, e),
            }
        }
        grace.abort();

        match outcome {
            Outcome::Finished(Ok(None)) => {
                let elapsed = started.elapsed();
                tracing::debug!("Pipeline finished in {:.1}s", elapsed.as_secs_f64());
                Ok(ExecutionResult {
                    output: output.to_path_buf(),
                    elapsed,
                })
            }
            Outcome::Finished(Ok(Some((program, status)))) => Err(BackupError::Execution {
                program,
                status,
                diagnostics,
            }),
            Outcome::Finished(Err(e)) => Err(e),
            Outcome::TimedOut(limit) => {
                tracing::warn!("Dump exceeded {:?}, killed", limit);
                Err(BackupError::Timeout(limit))
            }
            Outcome::Cancelled => {
                tracing::warn!("Dump cancelled, killed");
                Err(BackupError::Cancelled)
            }
        }
    }

    fn spawn_pipeline(
        &self,
        command: &ComposedCommand,
        file: std::fs::File,
        output: &Path,
        drain_stop: &CancellationToken,
    ) -> Result<Vec<Stage>, BackupError> {
        let specs = command.stages();
        let last = specs.len() - 1;
        let mut stages: Vec<Stage> = Vec::with_capacity(specs.len());
        let mut upstream: Option<Stdio> = None;
        let mut sink = Some(file);

        for (i, spec) in specs.iter().enumerate() {
            let mut cmd = Command::new(&spec.program);
            cmd.args(&spec.args)
                .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .stdin(upstream.take().unwrap_or_else(Stdio::null))
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            if i == last {
                match sink.take() {
                    Some(file) => cmd.stdout(file),
                    None => cmd.stdout(Stdio::null()),
                };
            } else {
                cmd.stdout(Stdio::piped());
            }

            // Stages already spawned are killed on drop if this one fails
            let mut child = cmd.spawn().map_err(|e| BackupError::io(&spec.program, e))?;

            if i != last {
                let stdout = child.stdout.take().ok_or_else(|| {
                    BackupError::io(
                        output,
                        std::io::Error::other(format!("{} has no stdout pipe", spec.program)),
                    )
                })?;
                let stdio: Stdio = stdout
                    .try_into()
                    .map_err(|e| BackupError::io(&spec.program, e))?;
                upstream = Some(stdio);
            }

            let stderr = tokio::spawn(forward_stderr(
                spec.program.clone(),
                child.stderr.take(),
                self.quiet,
                drain_stop.clone(),
            ));

            stages.push(Stage {
                program: spec.program.clone(),
                child,
                stderr,
            });
        }

        Ok(stages)
    }
}

/// Wait for every stage; report the first one that failed
async fn wait_all(stages: &mut [Stage]) -> Result<Option<(String, ExitStatus)>, BackupError> {
    let mut failure = None;
    for stage in stages.iter_mut() {
        let status = stage
            .child
            .wait()
            .await
            .map_err(|e| BackupError::io(&stage.program, e))?;
        tracing::debug!("{} exited with {}", stage.program, status);
        if !status.success() && failure.is_none() {
            failure = Some((stage.program.clone(), status));
        }
    }
    Ok(failure)
}

async fn kill_all(stages: &mut [Stage]) {
    for stage in stages.iter_mut() {
        if let Err(e) = stage.child.kill().await {
            tracing::debug!("Failed to kill {}: {}", stage.program, e);
        }
    }
}

/// Echo and capture a stage's stderr until EOF or `stop`
///
/// Lines are read as raw bytes. Dump tools print object names in the
/// database encoding, which need not be UTF-8.
async fn forward_stderr(
    program: String,
    stderr: Option<ChildStderr>,
    quiet: bool,
    stop: CancellationToken,
) -> String {
    let Some(stderr) = stderr else {
        return String::new();
    };

    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => read,
            _ = stop.cancelled() => {
                tracing::debug!("Stopped draining stderr of {}", program);
                break;
            }
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if !quiet {
                    eprintln!("{}", line);
                }
                if captured.len() + line.len() < MAX_CAPTURED_DIAGNOSTICS {
                    captured.push_str(line);
                    captured.push('\n');
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading stderr of {}: {}", program, e);
                break;
            }
        }
    }
    captured
}
