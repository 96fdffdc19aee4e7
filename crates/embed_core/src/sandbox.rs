use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use shared::protocol::{parse_test_report, ExecutionEvent, ExecutionRequest};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdout, Command},
    sync::mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::pipeline::{ExecutionEnvironment, ExecutionEventStream};

/// Runs each artifact in a fresh child process.
///
/// The artifact is written to the child's stdin. Stdout lines become `Stdout`
/// events unless they carry a test report, stderr lines become `Stderr` events,
/// and a failed exit is reported on `Stderr`. Isolation is whatever the runner
/// command provides.
pub struct ProcessExecutionEnvironment {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutionEnvironment {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_command_line(parts: &[String]) -> Result<Self> {
        let Some((program, args)) = parts.split_first() else {
            bail!("runner command must not be empty");
        };
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ExecutionEnvironment for ProcessExecutionEnvironment {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionEventStream> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("EMBED_ENTRY_POINT", &request.entry_point)
            .env("EMBED_IMPORTS", &request.imports)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start runner '{}'", self.program))?;

        let mut stdin = child.stdin.take().context("runner stdin unavailable")?;
        let stdout = child.stdout.take().context("runner stdout unavailable")?;
        let stderr = child.stderr.take().context("runner stderr unavailable")?;

        let artifact = request.artifact.0;
        tokio::spawn(async move {
            if let Err(err) = stdin.write_all(artifact.as_bytes()).await {
                debug!("sandbox: runner closed stdin early: {err}");
            }
        });

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(pump_process(child, stdout, stderr, tx));
        Ok(ReceiverStream::new(rx).boxed())
    }
}

async fn pump_process(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: mpsc::Sender<ExecutionEvent>,
) {
    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut reported = false;

    while stdout_open || stderr_open {
        let event = tokio::select! {
            line = stdout.next_line(), if stdout_open => match line {
                Ok(Some(line)) => classify_stdout_line(line, &mut reported),
                Ok(None) => {
                    stdout_open = false;
                    continue;
                }
                Err(err) => {
                    stdout_open = false;
                    ExecutionEvent::Stderr(format!("failed to read runner output: {err}"))
                }
            },
            line = stderr.next_line(), if stderr_open => match line {
                Ok(Some(line)) => ExecutionEvent::Stderr(line),
                Ok(None) => {
                    stderr_open = false;
                    continue;
                }
                Err(err) => {
                    stderr_open = false;
                    ExecutionEvent::Stderr(format!("failed to read runner errors: {err}"))
                }
            },
        };
        if tx.send(event).await.is_err() {
            // Nobody is listening; dropping the child kills it.
            return;
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => debug!("sandbox: runner exited cleanly"),
        Ok(status) => {
            let _ = tx
                .send(ExecutionEvent::Stderr(format!("runner exited with {status}")))
                .await;
        }
        Err(err) => {
            warn!("sandbox: failed to wait for runner: {err}");
            let _ = tx
                .send(ExecutionEvent::Stderr(format!("failed to wait for runner: {err}")))
                .await;
        }
    }
}

fn classify_stdout_line(line: String, reported: &mut bool) -> ExecutionEvent {
    match parse_test_report(&line) {
        None => ExecutionEvent::Stdout(line),
        Some(Ok(_)) if *reported => {
            ExecutionEvent::Stderr(format!("ignored additional test result: {line}"))
        }
        Some(Ok(report)) => {
            *reported = true;
            report.into_event()
        }
        Some(Err(err)) => ExecutionEvent::Stderr(format!("malformed test result ({err}): {line}")),
    }
}

#[cfg(test)]
#[path = "tests/sandbox_tests.rs"]
mod tests;
