//! `l9 kernels`: inspect the kernel stack and its integrity manifest.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use l9_config::Config;
use l9_kernel::{KernelActivation, KernelManifest, KernelStack, KernelStatus};
use l9_runtime::config_bridge::{kernel_root, manifest_path};

use crate::theme::Theme;

fn load_stack(cfg: &Config, workspace: &Path) -> KernelStack {
    KernelStack::load(kernel_root(cfg, workspace))
}

/// List every kernel in load order.
pub(crate) fn list_kernels(cfg: &Config, workspace: &Path) -> i32 {
    let stack = load_stack(cfg, workspace);
    let activation = KernelActivation::resolve(cfg.kernels.enabled, &stack);

    println!("\n{}", Theme::header("Kernel Stack"));
    println!("  {}", Theme::kv("Root", &stack.root().display().to_string()));
    println!("  {}", Theme::kv("Activation", &activation.to_string()));
    println!("{}", Theme::separator());
    println!("{:<18} {:<10} {}", "ID".dimmed(), "STATUS".dimmed(), "SHA-256".dimmed());

    for spec in stack.sequence() {
        let status = match stack.statuses().get(&spec.id) {
            Some(KernelStatus::Loaded) => "loaded".green().to_string(),
            Some(KernelStatus::Invalid { .. }) => "invalid".red().to_string(),
            Some(KernelStatus::Missing) | None => "missing".yellow().to_string(),
        };
        let digest = stack.hash_of(&spec.id).map_or("-", |h| h.get(..16).unwrap_or(h));
        println!("{:<18} {:<10} {}", spec.id, status, digest.dimmed());
    }
    println!();
    0
}

/// Print the value at `dotted` inside `kernel` as YAML.
pub(crate) fn show_rule(cfg: &Config, workspace: &Path, kernel: &str, dotted: &str) -> Result<i32> {
    let stack = load_stack(cfg, workspace);
    let Some(value) = stack.rule(kernel, dotted) else {
        eprintln!("{}", Theme::error(&format!("No value at {kernel}:{dotted}")));
        return Ok(1);
    };
    let rendered = serde_yaml::to_string(value).context("failed to render kernel value")?;
    print!("{rendered}");
    Ok(0)
}

/// Write the manifest from the kernels currently on disk.
pub(crate) fn lock_kernels(cfg: &Config, workspace: &Path) -> Result<i32> {
    let stack = load_stack(cfg, workspace);
    let manifest = stack.manifest();
    if manifest.kernels.is_empty() {
        eprintln!("{}", Theme::error("No kernel files found; nothing to lock"));
        return Ok(1);
    }
    let path = manifest_path(cfg, workspace);
    manifest
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "{}",
        Theme::success(&format!(
            "Locked {} kernels in {}",
            manifest.kernels.len(),
            path.display()
        ))
    );
    for missing in stack.not_loaded() {
        println!("{}", Theme::warning(&format!("{missing} not loaded")));
    }
    Ok(0)
}

/// Compare kernel files against the manifest. Exit 1 on any violation.
pub(crate) fn verify_kernels(cfg: &Config, workspace: &Path) -> Result<i32> {
    let path = manifest_path(cfg, workspace);
    let manifest = KernelManifest::load(&path)
        .with_context(|| format!("no usable manifest at {} (run `l9 kernels lock`)", path.display()))?;
    let stack = load_stack(cfg, workspace);

    let violations = stack.verify(&manifest);
    if violations.is_empty() {
        println!(
            "{}",
            Theme::success(&format!("{} kernel digests match", manifest.kernels.len()))
        );
        return Ok(0);
    }

    for violation in &violations {
        println!("{}", Theme::error(&violation.to_string()));
    }
    Ok(1)
}
