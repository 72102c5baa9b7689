//! Executors for approved tasks.
//!
//! Each executor turns a [`QueuedTask`] into one subprocess run. Failures of
//! any kind (bad payload, spawn error, non-zero exit, timeout) come back as
//! an [`ExecutionReport`] with `success = false`; nothing is retried.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use l9_core::TaskId;
use l9_queue::QueuedTask;

/// Captured output is cut to this many bytes per stream.
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Result of running one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// The task that ran.
    pub task_id: TaskId,
    /// Handler that ran it.
    pub handler: String,
    /// Process exit code; `None` if it never started, timed out, or was killed.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, or the reason the process never ran.
    pub stderr: String,
    /// Wall-clock run time in milliseconds.
    pub duration_ms: u64,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Whether the timeout fired.
    pub timed_out: bool,
}

impl ExecutionReport {
    fn failed(task: &QueuedTask, reason: impl Into<String>) -> Self {
        Self {
            task_id: task.task_id,
            handler: task.handler.clone(),
            exit_code: None,
            stdout: String::new(),
            stderr: reason.into(),
            duration_ms: 0,
            success: false,
            timed_out: false,
        }
    }
}

/// Runs tasks for one handler name.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Handler name matched against [`QueuedTask::handler`].
    fn handler(&self) -> &str;

    /// Run `task` to completion or timeout.
    async fn execute(&self, task: &QueuedTask) -> ExecutionReport;
}

/// A fully resolved subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to run.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
}

/// Run `spec` under `timeout` and report on it.
///
/// The child is killed when the timeout drops its future.
pub async fn run_process(
    task: &QueuedTask,
    spec: &ProcessSpec,
    timeout: Duration,
) -> ExecutionReport {
    debug!(
        task_id = %task.task_id,
        program = %spec.program,
        args = ?spec.args,
        "spawning task process"
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let started = Instant::now();
    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(
                task_id = %task.task_id,
                program = %spec.program,
                error = %e,
                "failed to spawn task process"
            );
            return ExecutionReport::failed(
                task,
                format!("failed to spawn {}: {e}", spec.program),
            );
        },
    };

    let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(Ok(output)) => ExecutionReport {
            task_id: task.task_id,
            handler: task.handler.clone(),
            exit_code: output.status.code(),
            stdout: truncate_output(&output.stdout),
            stderr: truncate_output(&output.stderr),
            duration_ms,
            success: output.status.success(),
            timed_out: false,
        },
        Ok(Err(e)) => ExecutionReport {
            duration_ms,
            ..ExecutionReport::failed(task, format!("failed to wait for {}: {e}", spec.program))
        },
        Err(_) => {
            warn!(task_id = %task.task_id, timeout_secs = timeout.as_secs(), "task process timed out");
            ExecutionReport {
                duration_ms,
                timed_out: true,
                ..ExecutionReport::failed(
                    task,
                    format!("timed out after {}s", timeout.as_secs()),
                )
            }
        },
    }
}

/// Lossy UTF-8, cut on a char boundary at [`MAX_OUTPUT_BYTES`].
fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    let mut cut = text.get(..end).unwrap_or_default().to_owned();
    cut.push_str("\n[output truncated]");
    cut
}

fn payload_str<'a>(task: &'a QueuedTask, key: &str) -> Option<&'a str> {
    task.payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Runs GMP tasks through the editor CLI.
///
/// Payload keys: `prompt` (inline text) or `gmp_file` (path to a prompt
/// file), and optionally `workspace` (working directory).
#[derive(Debug, Clone)]
pub struct GmpExecutor {
    cli_path: String,
    base_args: Vec<String>,
    workspace: PathBuf,
    timeout: Duration,
}

/// Arguments passed to the editor CLI before the prompt.
pub const DEFAULT_GMP_ARGS: &[&str] = &["--print"];

impl GmpExecutor {
    /// Executor for the CLI at `cli_path`, defaulting to `workspace`.
    #[must_use]
    pub fn new(
        cli_path: impl Into<String>,
        workspace: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            cli_path: cli_path.into(),
            base_args: DEFAULT_GMP_ARGS.iter().map(|s| (*s).to_owned()).collect(),
            workspace: workspace.into(),
            timeout,
        }
    }

    /// Replace the arguments placed before the prompt.
    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the invocation for `task`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the payload has no prompt or
    /// the prompt file cannot be read.
    pub async fn process_spec(&self, task: &QueuedTask) -> Result<ProcessSpec, String> {
        let workspace =
            payload_str(task, "workspace").map_or_else(|| self.workspace.clone(), PathBuf::from);

        let prompt = if let Some(prompt) = payload_str(task, "prompt") {
            prompt.to_owned()
        } else if let Some(file) = payload_str(task, "gmp_file") {
            let path = PathBuf::from(file);
            let path = if path.is_absolute() { path } else { workspace.join(path) };
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("failed to read GMP file {}: {e}", path.display()))?
        } else {
            return Err("GMP task has neither 'prompt' nor 'gmp_file'".to_owned());
        };

        let mut args = self.base_args.clone();
        args.push(prompt);
        Ok(ProcessSpec {
            program: self.cli_path.clone(),
            args,
            cwd: Some(workspace),
        })
    }
}

#[async_trait]
impl TaskExecutor for GmpExecutor {
    fn handler(&self) -> &str {
        "gmp"
    }

    async fn execute(&self, task: &QueuedTask) -> ExecutionReport {
        match self.process_spec(task).await {
            Ok(spec) => run_process(task, &spec, self.timeout).await,
            Err(reason) => ExecutionReport::failed(task, reason),
        }
    }
}

/// Runs `git` with the payload's `args` inside `repo_path`.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    git_path: String,
    repo_path: PathBuf,
    timeout: Duration,
}

impl GitExecutor {
    /// Executor for `git` on `PATH`, defaulting to `repo_path`.
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            git_path: "git".to_owned(),
            repo_path: repo_path.into(),
            timeout,
        }
    }

    /// Use a different git binary.
    #[must_use]
    pub fn with_git_path(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    /// Resolve the invocation for `task`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `args` is missing, empty, or
    /// holds a non-string.
    pub fn process_spec(&self, task: &QueuedTask) -> Result<ProcessSpec, String> {
        let args = task
            .payload
            .get("args")
            .and_then(Value::as_array)
            .ok_or("git task has no 'args' array")?
            .iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
            .ok_or("git task 'args' must all be strings")?;
        if args.is_empty() {
            return Err("git task 'args' is empty".to_owned());
        }
        let cwd =
            payload_str(task, "repo_path").map_or_else(|| self.repo_path.clone(), PathBuf::from);
        Ok(ProcessSpec {
            program: self.git_path.clone(),
            args,
            cwd: Some(cwd),
        })
    }
}

#[async_trait]
impl TaskExecutor for GitExecutor {
    fn handler(&self) -> &str {
        "git"
    }

    async fn execute(&self, task: &QueuedTask) -> ExecutionReport {
        match self.process_spec(task) {
            Ok(spec) => run_process(task, &spec, self.timeout).await,
            Err(reason) => ExecutionReport::failed(task, reason),
        }
    }
}
