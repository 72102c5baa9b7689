//! Bridge from `l9_config::Config` to domain types.
//!
//! The config crate depends on no other L9 crate. The CLI and the runtime
//! both go through these functions so each setting is interpreted in one
//! place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use l9_config::Config;
use l9_governance::ToolRiskTable;
use l9_telemetry::{FileRotation, LogConfig, LogFormat};

/// Resolve `path` against the workspace unless it is already absolute.
#[must_use]
pub fn resolve_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// Directory the kernel sequence is resolved under.
#[must_use]
pub fn kernel_root(cfg: &Config, workspace_root: &Path) -> PathBuf {
    resolve_path(workspace_root, &cfg.kernels.root)
}

/// Where the kernel integrity manifest lives.
///
/// Defaults to `kernels/manifest.yaml` under the kernel root.
#[must_use]
pub fn manifest_path(cfg: &Config, workspace_root: &Path) -> PathBuf {
    match &cfg.kernels.manifest {
        Some(path) => resolve_path(workspace_root, path),
        None => kernel_root(cfg, workspace_root).join("kernels").join("manifest.yaml"),
    }
}

/// Optional governance rule file.
#[must_use]
pub fn rules_path(cfg: &Config, workspace_root: &Path) -> Option<PathBuf> {
    cfg.governance
        .rules_file
        .as_deref()
        .map(|p| resolve_path(workspace_root, p))
}

/// Builtin tool risks plus the configured extras.
#[must_use]
pub fn to_risk_table(cfg: &Config) -> ToolRiskTable {
    ToolRiskTable::builtin().with_high_risk(cfg.approvals.extra_high_risk_tools.iter())
}

/// How long an approval request stays pending.
#[must_use]
pub fn approval_ttl(cfg: &Config) -> Duration {
    Duration::from_secs(cfg.approvals.ttl_secs)
}

/// Per-task executor timeout.
#[must_use]
pub fn gmp_timeout(cfg: &Config) -> Duration {
    Duration::from_secs(cfg.worker.gmp_timeout_secs)
}

/// Delay between empty queue polls.
#[must_use]
pub fn poll_interval(cfg: &Config) -> Duration {
    Duration::from_millis(cfg.worker.poll_interval_ms)
}

/// Convert the `[logging]` section to a [`LogConfig`].
///
/// Unknown formats fall back to compact; `validate` rejects them earlier.
/// A relative `directory` resolves under the workspace.
#[must_use]
pub fn to_log_config(cfg: &Config, workspace_root: &Path) -> LogConfig {
    let format = cfg.logging.format.parse().unwrap_or(LogFormat::Compact);
    let mut log = cfg
        .logging
        .directives
        .iter()
        .fold(LogConfig::new(&cfg.logging.level).with_format(format), |log, d| {
            log.with_directive(d)
        });
    if let Some(dir) = &cfg.logging.directory {
        log = log.with_file_logging(resolve_path(workspace_root, dir), FileRotation::Daily);
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_under_workspace() {
        let mut cfg = Config::default();
        cfg.kernels.root = PathBuf::from("agents/l");
        let ws = Path::new("/srv/l9");
        assert_eq!(kernel_root(&cfg, ws), PathBuf::from("/srv/l9/agents/l"));
        assert_eq!(
            manifest_path(&cfg, ws),
            PathBuf::from("/srv/l9/agents/l/kernels/manifest.yaml")
        );

        cfg.kernels.manifest = Some(PathBuf::from("/etc/l9/manifest.yaml"));
        assert_eq!(manifest_path(&cfg, ws), PathBuf::from("/etc/l9/manifest.yaml"));
    }

    #[test]
    fn test_extra_high_risk_tools_applied() {
        let mut cfg = Config::default();
        cfg.approvals.extra_high_risk_tools = vec!["deploy_prod".into()];
        let table = to_risk_table(&cfg);
        assert!(table.requires_approval("deploy_prod"));
        assert!(table.requires_approval("git_push"));
        assert!(!table.requires_approval("file_read"));
    }

    #[test]
    fn test_durations() {
        let cfg = Config::default();
        assert_eq!(approval_ttl(&cfg), Duration::from_secs(3600));
        assert_eq!(gmp_timeout(&cfg), Duration::from_secs(600));
        assert_eq!(poll_interval(&cfg), Duration::from_millis(2000));
    }

    #[test]
    fn test_log_config_from_section() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".into();
        cfg.logging.directives = vec!["l9_queue=debug".into()];
        let ws = Path::new("/srv/l9");

        let log = to_log_config(&cfg, ws);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["l9_queue=debug"]);
        assert_eq!(log.target, l9_telemetry::LogTarget::Stderr);

        cfg.logging.directory = Some(PathBuf::from("logs"));
        let log = to_log_config(&cfg, ws);
        assert_eq!(log.target, l9_telemetry::LogTarget::File(PathBuf::from("/srv/l9/logs")));
        assert!(!log.ansi);
    }
}
