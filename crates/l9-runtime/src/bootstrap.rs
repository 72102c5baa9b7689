//! Workspace readiness checks behind `l9 init-workspace`.
//!
//! Each check reports `Ok`, `Warn`, or `Fail`. Any failure blocks the
//! workspace, any warning degrades it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use l9_config::{Config, QueueBackendKind};
use l9_kernel::{KernelActivation, KernelManifest, KernelStack};
use l9_queue::{QueueBackend, RedisBackend};

use crate::config_bridge::{kernel_root, manifest_path};
use crate::error::RuntimeResult;

const REDIS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Nothing to fix.
    Ok,
    /// Works, but not at full capability.
    Warn,
    /// Cannot work.
    Fail,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warn => write!(f, "WARN"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// A single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceCheck {
    /// What was checked.
    pub component: String,
    /// Result.
    pub state: CheckState,
    /// Detail for the operator.
    pub message: String,
    /// How long the check took.
    pub duration_ms: u64,
}

impl WorkspaceCheck {
    fn new(
        component: &str,
        state: CheckState,
        message: impl Into<String>,
        started: Instant,
    ) -> Self {
        Self {
            component: component.to_owned(),
            state,
            message: message.into(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Overall workspace readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkspaceStatus {
    /// Every check passed.
    Ready,
    /// Some checks warned.
    Degraded,
    /// At least one check failed.
    Blocked,
}

impl WorkspaceStatus {
    /// Process exit code: 0 ready, 1 degraded, 2 blocked.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Ready => 0,
            Self::Degraded => 1,
            Self::Blocked => 2,
        }
    }
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Every check run against a workspace.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceReport {
    /// Workspace that was inspected.
    pub workspace: PathBuf,
    /// Checks in the order they ran.
    pub checks: Vec<WorkspaceCheck>,
    /// Overall status.
    pub status: WorkspaceStatus,
}

impl WorkspaceReport {
    fn from_checks(workspace: &Path, checks: Vec<WorkspaceCheck>) -> Self {
        let status = if checks.iter().any(|c| c.state == CheckState::Fail) {
            WorkspaceStatus::Blocked
        } else if checks.iter().any(|c| c.state == CheckState::Warn) {
            WorkspaceStatus::Degraded
        } else {
            WorkspaceStatus::Ready
        };
        Self {
            workspace: workspace.to_path_buf(),
            checks,
            status,
        }
    }

    /// The check for `component`, if it ran.
    #[must_use]
    pub fn check(&self, component: &str) -> Option<&WorkspaceCheck> {
        self.checks.iter().find(|c| c.component == component)
    }
}

/// Create `{workspace}/.l9/` if it is missing. Returns whether it was created.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn prepare_workspace(workspace: &Path) -> RuntimeResult<bool> {
    let dir = workspace.join(l9_config::loader::CONFIG_DIR_NAME);
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(&dir)?;
    info!(path = %dir.display(), "created workspace config directory");
    Ok(true)
}

/// Run every readiness check against `workspace`.
///
/// Later checks are skipped once the workspace directory itself is missing.
pub async fn inspect_workspace(workspace: &Path, cfg: &Config) -> WorkspaceReport {
    let mut checks = vec![check_workspace_dir(workspace)];
    if checks.iter().any(|c| c.state == CheckState::Fail) {
        return WorkspaceReport::from_checks(workspace, checks);
    }

    checks.push(check_kernels(workspace, cfg));
    checks.push(check_manifest(workspace, cfg));
    checks.push(check_queue(cfg).await);
    checks.push(check_editor_cli(cfg));
    checks.push(check_api_key(cfg));
    checks.push(check_storage(cfg));

    let report = WorkspaceReport::from_checks(workspace, checks);
    info!(workspace = %workspace.display(), status = %report.status, "workspace inspected");
    report
}

fn check_workspace_dir(workspace: &Path) -> WorkspaceCheck {
    let started = Instant::now();
    if workspace.is_dir() {
        WorkspaceCheck::new(
            "workspace",
            CheckState::Ok,
            workspace.display().to_string(),
            started,
        )
    } else {
        WorkspaceCheck::new(
            "workspace",
            CheckState::Fail,
            format!("{} is not a directory", workspace.display()),
            started,
        )
    }
}

fn check_kernels(workspace: &Path, cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    if !cfg.kernels.enabled {
        return WorkspaceCheck::new(
            "kernels",
            CheckState::Warn,
            "disabled (L9_USE_KERNELS=false)",
            started,
        );
    }
    let stack = KernelStack::load(kernel_root(cfg, workspace));
    match KernelActivation::resolve(true, &stack) {
        KernelActivation::Active => WorkspaceCheck::new(
            "kernels",
            CheckState::Ok,
            format!("{} kernels loaded", stack.loaded_count()),
            started,
        ),
        other => WorkspaceCheck::new("kernels", CheckState::Warn, other.to_string(), started),
    }
}

fn check_manifest(workspace: &Path, cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    let path = manifest_path(cfg, workspace);
    if !path.exists() {
        return WorkspaceCheck::new(
            "kernel manifest",
            CheckState::Warn,
            format!("no manifest at {} (run `l9 kernels lock`)", path.display()),
            started,
        );
    }
    let manifest = match KernelManifest::load(&path) {
        Ok(m) => m,
        Err(e) => {
            return WorkspaceCheck::new("kernel manifest", CheckState::Fail, e.to_string(), started);
        },
    };
    let stack = KernelStack::load(kernel_root(cfg, workspace));
    let violations = stack.verify(&manifest);
    if violations.is_empty() {
        WorkspaceCheck::new(
            "kernel manifest",
            CheckState::Ok,
            format!("{} digests match", manifest.kernels.len()),
            started,
        )
    } else {
        let detail: Vec<String> = violations.iter().map(ToString::to_string).collect();
        WorkspaceCheck::new("kernel manifest", CheckState::Fail, detail.join("; "), started)
    }
}

async fn check_queue(cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    if cfg.queue.backend == QueueBackendKind::Memory {
        return WorkspaceCheck::new("redis", CheckState::Ok, "memory queue configured", started);
    }
    let url = cfg.queue.redis_url();
    let probe = async {
        let backend = RedisBackend::new(&url, &cfg.queue.key_prefix)?;
        backend.ping().await
    };
    match tokio::time::timeout(REDIS_PROBE_TIMEOUT, probe).await {
        Ok(Ok(())) => WorkspaceCheck::new("redis", CheckState::Ok, url, started),
        Ok(Err(e)) => {
            debug!(error = %e, "redis probe failed");
            WorkspaceCheck::new(
                "redis",
                CheckState::Warn,
                format!("{url} unreachable, using memory queue: {e}"),
                started,
            )
        },
        Err(_) => WorkspaceCheck::new(
            "redis",
            CheckState::Warn,
            format!("{url} timed out, using memory queue"),
            started,
        ),
    }
}

fn check_editor_cli(cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    match which::which(&cfg.worker.cursor_cli_path) {
        Ok(path) => WorkspaceCheck::new(
            "editor cli",
            CheckState::Ok,
            path.display().to_string(),
            started,
        ),
        Err(_) => WorkspaceCheck::new(
            "editor cli",
            CheckState::Warn,
            format!("'{}' not found (set CURSOR_CLI_PATH)", cfg.worker.cursor_cli_path),
            started,
        ),
    }
}

fn check_api_key(cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    let present = cfg
        .llm
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if present {
        WorkspaceCheck::new(
            "api key",
            CheckState::Ok,
            format!("{} key set", cfg.llm.provider),
            started,
        )
    } else {
        WorkspaceCheck::new("api key", CheckState::Warn, "OPENAI_API_KEY not set", started)
    }
}

fn check_storage(cfg: &Config) -> WorkspaceCheck {
    let started = Instant::now();
    match (&cfg.storage.database_url, cfg!(feature = "postgres")) {
        (None, _) => {
            WorkspaceCheck::new("storage", CheckState::Ok, "in-memory packet store", started)
        },
        (Some(_), true) => {
            WorkspaceCheck::new("storage", CheckState::Ok, "postgres packet store", started)
        },
        (Some(_), false) => WorkspaceCheck::new(
            "storage",
            CheckState::Warn,
            "DATABASE_URL set but postgres support is not built in",
            started,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        let mut cfg = Config::default();
        cfg.queue.backend = QueueBackendKind::Memory;
        cfg.llm.api_key = Some("sk-test".into());
        cfg
    }

    #[tokio::test]
    async fn test_missing_workspace_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let report = inspect_workspace(&missing, &memory_config()).await;
        assert_eq!(report.status, WorkspaceStatus::Blocked);
        assert_eq!(report.status.exit_code(), 2);
        assert_eq!(report.checks.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_workspace_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let report = inspect_workspace(dir.path(), &memory_config()).await;
        assert_eq!(report.status, WorkspaceStatus::Degraded);
        assert_eq!(report.status.exit_code(), 1);
        assert_eq!(report.check("kernels").unwrap().state, CheckState::Warn);
        assert_eq!(report.check("redis").unwrap().state, CheckState::Ok);
        assert_eq!(report.check("api key").unwrap().state, CheckState::Ok);
    }

    #[tokio::test]
    async fn test_tampered_manifest_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let kernels = dir.path().join("kernels");
        std::fs::create_dir_all(&kernels).unwrap();
        let mut manifest = KernelManifest::default();
        manifest.kernels.insert("master".into(), "0".repeat(64));
        manifest.save(&kernels.join("manifest.yaml")).unwrap();

        let report = inspect_workspace(dir.path(), &memory_config()).await;
        assert_eq!(report.check("kernel manifest").unwrap().state, CheckState::Fail);
        assert_eq!(report.status, WorkspaceStatus::Blocked);
    }

    #[test]
    fn test_prepare_workspace_creates_config_dir_once() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_workspace(dir.path()).unwrap());
        assert!(dir.path().join(".l9").is_dir());
        assert!(!prepare_workspace(dir.path()).unwrap());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(WorkspaceStatus::Ready.exit_code(), 0);
        assert_eq!(WorkspaceStatus::Degraded.exit_code(), 1);
        assert_eq!(WorkspaceStatus::Blocked.exit_code(), 2);
    }
}
