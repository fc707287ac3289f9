//! External tool invocation
//!
//! The invoker runs one command at a time and captures its full output. A
//! non-zero exit code is data for the caller, not an error; only
//! infrastructure faults (spawn failure, missing working directory, death
//! by signal, timeout) surface as errors.

use crate::error::{StagehandError, StagehandResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

/// A single external command to run
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Executable name or path
    pub command: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory; inherits the orchestrator's when absent
    pub workdir: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment
    pub env: HashMap<String, String>,
    /// Optional wall-clock limit for this invocation
    pub timeout_secs: Option<u64>,
}

impl ToolInvocation {
    /// One-line rendering for logs and reports
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Captured outcome of one invocation. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Create a linked cancellation pair. The trigger side is held by the
/// signal handler; tokens are cloned into whatever is currently blocking.
pub fn cancel_pair() -> (CancelTrigger, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelToken { rx })
}

/// Fires the cancellation signal
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

impl CancelTrigger {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes the cancellation signal
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires; pends forever otherwise, including
    /// after the trigger is dropped without firing.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run an invocation to completion, capturing stdout and stderr fully.
///
/// The calling stage blocks until the child exits; there is no streaming
/// and no concurrency between invocations.
pub async fn invoke(
    invocation: &ToolInvocation,
    cancel: &CancelToken,
) -> StagehandResult<ToolResult> {
    let rendered = invocation.display();

    if let Some(dir) = &invocation.workdir {
        if !dir.is_dir() {
            return Err(StagehandError::WorkdirNotFound(dir.clone()));
        }
    }

    debug!("Executing: {}", rendered);

    let mut cmd = Command::new(&invocation.command);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.workdir {
        cmd.current_dir(dir);
    }
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| StagehandError::spawn_failed(rendered.clone(), e))?;

    // Drain both pipes concurrently with the wait, so a chatty child can't
    // deadlock on a full pipe buffer.
    let stdout_task = child.stdout.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    });
    let stderr_task = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    });

    enum WaitOutcome {
        Exited(std::io::Result<std::process::ExitStatus>),
        Cancelled,
        TimedOut,
    }

    let mut cancel = cancel.clone();
    let outcome = tokio::select! {
        status = child.wait() => WaitOutcome::Exited(status),
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = sleep_or_pend(invocation.timeout_secs) => WaitOutcome::TimedOut,
    };

    let status = match outcome {
        WaitOutcome::Exited(status) => {
            status.map_err(|e| StagehandError::io(format!("waiting for {}", rendered), e))?
        }
        WaitOutcome::Cancelled => {
            let _ = child.kill().await;
            return Err(StagehandError::Cancelled);
        }
        WaitOutcome::TimedOut => {
            let _ = child.kill().await;
            return Err(StagehandError::CommandTimeout {
                command: rendered,
                seconds: invocation.timeout_secs.unwrap_or_default(),
            });
        }
    };

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    let exit_code = status
        .code()
        .ok_or(StagehandError::CommandSignaled { command: rendered })?;

    Ok(ToolResult {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Sleep for the given seconds, or pend forever when no timeout is set
async fn sleep_or_pend(secs: Option<u64>) {
    match secs {
        Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}
