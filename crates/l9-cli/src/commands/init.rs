//! `l9 init-workspace`: readiness report for a workspace.

use std::path::Path;

use anyhow::Result;
use l9_config::{ConfigResult, ResolvedConfig};
use l9_runtime::{WorkspaceReport, WorkspaceStatus, inspect_workspace, prepare_workspace};

use crate::theme::Theme;

/// Create `.l9/` if needed, run every check, and return 0/1/2.
///
/// A configuration error blocks the workspace.
pub(crate) async fn run_init_workspace(
    workspace: &Path,
    loaded: ConfigResult<ResolvedConfig>,
    quiet: bool,
) -> Result<i32> {
    let resolved = match loaded {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("Configuration error: {e}")));
            return Ok(WorkspaceStatus::Blocked.exit_code());
        },
    };

    if workspace.is_dir() && prepare_workspace(workspace)? && !quiet {
        println!("{}", Theme::success("Created .l9/"));
    }

    let report = inspect_workspace(workspace, &resolved.config).await;
    if !quiet {
        print_report(&report, &resolved);
    }
    Ok(report.status.exit_code())
}

fn print_report(report: &WorkspaceReport, resolved: &ResolvedConfig) {
    println!("\n{}", Theme::header("L9 Workspace Check"));
    println!("  {}", Theme::kv("Workspace", &report.workspace.display().to_string()));
    if !resolved.loaded_files.is_empty() {
        println!("  {}", Theme::kv("Config", &resolved.loaded_files.join(", ")));
    }
    println!("{}", Theme::separator());

    for check in &report.checks {
        println!(
            "  {:<6} {} - {} {}",
            Theme::check_state(check.state),
            check.component,
            check.message,
            Theme::dimmed(&format!("({}ms)", check.duration_ms))
        );
    }

    println!();
    let summary = match report.status {
        WorkspaceStatus::Ready => Theme::success("READY"),
        WorkspaceStatus::Degraded => Theme::warning("DEGRADED: running with reduced capability"),
        WorkspaceStatus::Blocked => Theme::error("BLOCKED: fix the failures above"),
    };
    println!("{summary}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use l9_config::{Config, ConfigError};

    fn resolved(config: Config) -> ConfigResult<ResolvedConfig> {
        Ok(ResolvedConfig {
            config,
            field_sources: l9_config::merge::FieldSources::new(),
            loaded_files: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_config_error_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let err = Err(ConfigError::ValidationError {
            field: "queue.redis_port".into(),
            message: "must be non-zero".into(),
        });
        let code = run_init_workspace(dir.path(), err, true).await.unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_missing_workspace_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let code = run_init_workspace(&missing, resolved(Config::default()), true)
            .await
            .unwrap();
        assert_eq!(code, 2);
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_creates_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.queue.backend = l9_config::QueueBackendKind::Memory;
        let code = run_init_workspace(dir.path(), resolved(config), true)
            .await
            .unwrap();
        assert!(dir.path().join(".l9").is_dir());
        // No kernels, no API key.
        assert_eq!(code, 1);
    }
}
